// src/alerts/engine.rs
//! `AlertEngine`: evaluates the static rule list against the store once per cycle.
//!
//! Rules run sequentially in configured order. A store error inside one rule is
//! logged and counted as "no alert"; a delivery or alert-log failure is logged
//! and counted. Neither stops the remaining rules.

use chrono::{Duration, Utc};
use metrics::{counter, gauge};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::conditions::{keyword_alert, keyword_pattern, mention_alert, sentiment_alert};
use super::{Alert, AlertRule, ConditionType, Severity};
use crate::config::{validate_rules, ConfigError};
use crate::notify::Notifier;
use crate::store::{AlertLogEntry, ResponseStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Trailing window every aggregate is computed over.
    pub window: Duration,
    /// Newest keyword matches fetched per rule.
    pub keyword_match_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: Duration::hours(1),
            keyword_match_limit: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Inactive,
    NoAlert,
    /// Data access failed; treated as no alert.
    EvaluationFailed,
    Alerted {
        severity: Severity,
        delivered: bool,
        logged: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleReport {
    pub rule: String,
    pub outcome: RuleOutcome,
}

/// Per-rule outcomes of one `run_cycle`, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub rules: Vec<RuleReport>,
}

impl CycleReport {
    pub fn outcome(&self, rule: &str) -> Option<&RuleOutcome> {
        self.rules.iter().find(|r| r.rule == rule).map(|r| &r.outcome)
    }

    pub fn alerts_triggered(&self) -> usize {
        self.rules
            .iter()
            .filter(|r| matches!(r.outcome, RuleOutcome::Alerted { .. }))
            .count()
    }

    pub fn evaluation_failures(&self) -> usize {
        self.rules
            .iter()
            .filter(|r| r.outcome == RuleOutcome::EvaluationFailed)
            .count()
    }
}

pub struct AlertEngine {
    rules: Vec<AlertRule>,
    store: Arc<dyn ResponseStore>,
    notifier: Arc<dyn Notifier>,
    cfg: EngineConfig,
}

impl AlertEngine {
    /// Validates every rule up front; a malformed rule is a startup error.
    pub fn new(
        rules: Vec<AlertRule>,
        store: Arc<dyn ResponseStore>,
        notifier: Arc<dyn Notifier>,
        cfg: EngineConfig,
    ) -> Result<Self, ConfigError> {
        validate_rules(&rules)?;
        if cfg.window <= Duration::zero() {
            return Err(ConfigError::InvalidRule {
                rule: "*".into(),
                reason: "window must be positive".into(),
            });
        }
        crate::metrics::ensure_metrics_described();
        info!(
            target: "alerts",
            rules = rules.len(),
            active = rules.iter().filter(|r| r.active).count(),
            store = store.name(),
            notifier = notifier.name(),
            "alert engine ready"
        );
        Ok(Self {
            rules,
            store,
            notifier,
            cfg,
        })
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    /// Evaluate one rule against the current window. Does not notify or log.
    pub async fn evaluate_rule(&self, rule: &AlertRule) -> Result<Option<Alert>, StoreError> {
        let window = self.cfg.window;
        let alert = match rule.condition_type {
            ConditionType::SentimentThreshold => {
                let rows = self
                    .store
                    .windowed_sentiment_counts(&rule.ai_sources, window)
                    .await?;
                sentiment_alert(rule, &rows, window, Utc::now())
            }
            ConditionType::MentionCount => {
                let rows = self
                    .store
                    .windowed_mention_counts(&rule.brand_keywords, &rule.ai_sources, window)
                    .await?;
                mention_alert(rule, &rows, window, Utc::now())
            }
            ConditionType::KeywordDetection => {
                let pattern = keyword_pattern(&rule.brand_keywords);
                let matches = self
                    .store
                    .windowed_keyword_matches(
                        &rule.ai_sources,
                        &pattern,
                        window,
                        self.cfg.keyword_match_limit,
                    )
                    .await?;
                keyword_alert(rule, &matches, window, Utc::now())
            }
        };
        Ok(alert)
    }

    /// One full pass over the rule list. Never fails; see `CycleReport`.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        for rule in &self.rules {
            let outcome = if !rule.active {
                debug!(target: "alerts", rule = %rule.name, "rule inactive; skipped");
                RuleOutcome::Inactive
            } else {
                match self.evaluate_rule(rule).await {
                    Ok(Some(alert)) => self.dispatch(rule, &alert).await,
                    Ok(None) => RuleOutcome::NoAlert,
                    Err(e) => {
                        counter!("alert_rule_errors_total").increment(1);
                        warn!(
                            target: "alerts",
                            rule = %rule.name,
                            condition = %rule.condition_type,
                            error = %e,
                            "rule evaluation failed; treated as no alert"
                        );
                        RuleOutcome::EvaluationFailed
                    }
                }
            };
            report.rules.push(RuleReport {
                rule: rule.name.clone(),
                outcome,
            });
        }

        gauge!("alert_cycle_last_run_ts").set(Utc::now().timestamp() as f64);
        info!(
            target: "alerts",
            evaluated = report.rules.len(),
            alerts = report.alerts_triggered(),
            failures = report.evaluation_failures(),
            "alert cycle finished"
        );
        report
    }

    async fn dispatch(&self, rule: &AlertRule, alert: &Alert) -> RuleOutcome {
        counter!("alerts_triggered_total", "severity" => alert.severity.as_str()).increment(1);
        info!(
            target: "alerts",
            rule = %rule.name,
            severity = %alert.severity,
            recipients = rule.recipients.len(),
            "alert triggered"
        );

        let delivered = match self.notifier.send(&rule.recipients, alert).await {
            Ok(()) => true,
            Err(e) => {
                counter!("alert_delivery_failures_total").increment(1);
                error!(target: "alerts", rule = %rule.name, error = %e, "alert delivery failed");
                false
            }
        };

        let logged = match self.store.append_alert_log(&AlertLogEntry::from(alert)).await {
            Ok(()) => true,
            Err(e) => {
                counter!("alert_delivery_failures_total").increment(1);
                error!(target: "alerts", rule = %rule.name, error = %e, "alert log append failed");
                false
            }
        };

        RuleOutcome::Alerted {
            severity: alert.severity,
            delivered,
            logged,
        }
    }
}
