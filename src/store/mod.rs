// src/store/mod.rs
//! Read/write contract against persisted AI responses, brand mentions and the alert log.
//!
//! The alert engine only reads windowed aggregates; the analysis pipeline only
//! writes analysis fields and mentions. Implementations acquire a connection per
//! call and release it before returning (no transaction spans two calls).
//! `persist_analysis` writes sentiment, links and mentions as one unit, so a
//! response is either fully analysed or still pending.
//!
//! Ordering contract for aggregates:
//! - sentiment counts follow the order of `ai_sources` as given;
//! - mention counts follow brand order, then source order;
//! - keyword matches are newest first.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::{Alert, AlertData, Severity};
use crate::analyze::{Mention, MentionType, Sentiment};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    #[error("query failed: {message}")]
    Query { message: String },

    #[error("response not found: {id}")]
    NotFound { id: i64 },

    #[error("invariant violated: {message}")]
    Invariant { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Raw response as submitted by a collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewResponse {
    pub ai_name: String,
    pub query_text: String,
    pub response_text: String,
    /// `None` means "now".
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewResponse {
    pub fn new(ai_name: impl Into<String>, query_text: impl Into<String>, response_text: impl Into<String>) -> Self {
        Self {
            ai_name: ai_name.into(),
            query_text: query_text.into(),
            response_text: response_text.into(),
            timestamp: None,
        }
    }

    pub fn at(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }
}

/// Persisted response. `sentiment` and `links` are written once by the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    pub id: i64,
    pub ai_name: String,
    pub query_text: String,
    pub response_text: String,
    pub sentiment: Option<Sentiment>,
    pub links: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Persisted mention row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandMention {
    pub ai_response_id: i64,
    pub brand_name: String,
    pub mention_type: MentionType,
    pub sentiment: Sentiment,
    pub context: String,
}

impl BrandMention {
    pub fn from_mention(ai_response_id: i64, m: &Mention) -> Self {
        Self {
            ai_response_id,
            brand_name: m.brand_name.clone(),
            mention_type: m.mention_type,
            sentiment: m.sentiment,
            context: m.context.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSentimentCount {
    pub ai_name: String,
    pub total: u64,
    pub negative: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionCount {
    pub brand_name: String,
    pub ai_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub ai_name: String,
    pub query_text: String,
    pub response_text: String,
    pub timestamp: DateTime<Utc>,
}

/// `total` counts every match in the window; `recent` holds the newest ones, up to the limit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KeywordMatches {
    pub total: u64,
    pub recent: Vec<KeywordMatch>,
}

/// Durable record of a dispatched alert. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertLogEntry {
    pub rule_name: String,
    pub message: String,
    pub severity: Severity,
    pub data: AlertData,
    pub timestamp: DateTime<Utc>,
}

impl From<&Alert> for AlertLogEntry {
    fn from(a: &Alert) -> Self {
        Self {
            rule_name: a.rule_name.clone(),
            message: a.message.clone(),
            severity: a.severity,
            data: a.data.clone(),
            timestamp: a.timestamp,
        }
    }
}

#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Collector write path; returns the new response id.
    async fn insert_response(&self, new: NewResponse) -> Result<i64, StoreError>;

    /// Responses without sentiment, newest first.
    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<AiResponse>, StoreError>;

    async fn update_response_analysis(
        &self,
        response_id: i64,
        sentiment: Sentiment,
        links: &[String],
    ) -> Result<(), StoreError>;

    /// Fails with `StoreError::Invariant` if the response has no sentiment yet.
    async fn insert_mentions(&self, response_id: i64, mentions: &[Mention]) -> Result<(), StoreError>;

    /// Analysis fields and mention rows in one atomic write. On error nothing is
    /// stored and the response stays in `fetch_unprocessed`.
    async fn persist_analysis(
        &self,
        response_id: i64,
        sentiment: Sentiment,
        links: &[String],
        mentions: &[Mention],
    ) -> Result<(), StoreError>;

    async fn windowed_sentiment_counts(
        &self,
        ai_sources: &[String],
        window: Duration,
    ) -> Result<Vec<SourceSentimentCount>, StoreError>;

    /// Brand names compare case-insensitively; rows carry the spelling from `brands`.
    async fn windowed_mention_counts(
        &self,
        brands: &[String],
        ai_sources: &[String],
        window: Duration,
    ) -> Result<Vec<MentionCount>, StoreError>;

    /// `pattern` is a case-insensitive regex tested against response and query text.
    async fn windowed_keyword_matches(
        &self,
        ai_sources: &[String],
        pattern: &str,
        window: Duration,
        limit: usize,
    ) -> Result<KeywordMatches, StoreError>;

    async fn append_alert_log(&self, entry: &AlertLogEntry) -> Result<(), StoreError>;

    fn name(&self) -> &'static str;
}

/// Start of a trailing window ending now.
pub fn window_start(window: Duration) -> DateTime<Utc> {
    Utc::now() - window
}
