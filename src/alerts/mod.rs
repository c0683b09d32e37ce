// src/alerts/mod.rs
//! Rule-driven anomaly detection over windowed aggregates.
//!
//! `conditions` holds the pure decision functions (aggregate rows in, optional
//! `Alert` out); `engine` wires them to a `ResponseStore` and a `Notifier`.

pub mod conditions;
pub mod engine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use engine::{AlertEngine, CycleReport, EngineConfig, RuleOutcome};

/// Display rows attached to an alert (label -> value), in insertion order.
pub type AlertData = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Header colour used by rich renderings.
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Low => "#28a745",
            Severity::Medium => "#ffc107",
            Severity::High => "#fd7e14",
            Severity::Critical => "#dc3545",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub rule_name: String,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub data: AlertData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    SentimentThreshold,
    MentionCount,
    KeywordDetection,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::SentimentThreshold => "sentiment_threshold",
            ConditionType::MentionCount => "mention_count",
            ConditionType::KeywordDetection => "keyword_detection",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_active() -> bool {
    true
}

/// A named condition evaluated once per cycle. Loaded at startup; never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub name: String,
    pub condition_type: ConditionType,
    pub threshold: f64,
    #[serde(default)]
    pub brand_keywords: Vec<String>,
    #[serde(default)]
    pub ai_sources: Vec<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}
