// src/store/memory.rs
//! In-memory `ResponseStore`. Same contract as the Postgres store; used by tests,
//! the demo binary, and anywhere a database is not wanted.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use regex::RegexBuilder;
use parking_lot::{Mutex, MutexGuard};

use super::{
    window_start, AiResponse, AlertLogEntry, BrandMention, KeywordMatch, KeywordMatches,
    MentionCount, NewResponse, ResponseStore, SourceSentimentCount, StoreError,
};
use crate::analyze::{Mention, Sentiment};

#[derive(Debug, Default)]
struct Inner {
    responses: Vec<AiResponse>,
    mentions: Vec<BrandMention>,
    alert_log: Vec<AlertLogEntry>,
    next_id: i64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock()
    }

    /// Insert a response that has already been analysed (fixtures, demo).
    pub fn seed_response(
        &self,
        ai_name: &str,
        response_text: &str,
        sentiment: Option<Sentiment>,
        timestamp: DateTime<Utc>,
    ) -> i64 {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.responses.push(AiResponse {
            id,
            ai_name: ai_name.to_string(),
            query_text: String::new(),
            response_text: response_text.to_string(),
            sentiment,
            links: Vec::new(),
            timestamp,
        });
        id
    }

    /// Attach a mention row; the response must exist and carry a sentiment.
    pub fn seed_mention(&self, mention: BrandMention) -> Result<(), StoreError> {
        let mut inner = self.lock();
        ensure_analysed(&inner, mention.ai_response_id)?;
        inner.mentions.push(mention);
        Ok(())
    }

    pub fn response(&self, id: i64) -> Option<AiResponse> {
        self.lock().responses.iter().find(|r| r.id == id).cloned()
    }

    pub fn mentions_for(&self, id: i64) -> Vec<BrandMention> {
        self.lock()
            .mentions
            .iter()
            .filter(|m| m.ai_response_id == id)
            .cloned()
            .collect()
    }

    pub fn alert_log(&self) -> Vec<AlertLogEntry> {
        self.lock().alert_log.clone()
    }
}

fn ensure_analysed(inner: &Inner, id: i64) -> Result<(), StoreError> {
    match inner.responses.iter().find(|r| r.id == id) {
        None => Err(StoreError::NotFound { id }),
        Some(r) if r.sentiment.is_none() => Err(StoreError::Invariant {
            message: format!("response {id} has no sentiment; mentions rejected"),
        }),
        Some(_) => Ok(()),
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn insert_response(&self, new: NewResponse) -> Result<i64, StoreError> {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.responses.push(AiResponse {
            id,
            ai_name: new.ai_name,
            query_text: new.query_text,
            response_text: new.response_text,
            sentiment: None,
            links: Vec::new(),
            timestamp: new.timestamp.unwrap_or_else(Utc::now),
        });
        Ok(id)
    }

    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<AiResponse>, StoreError> {
        let inner = self.lock();
        let mut out: Vec<AiResponse> = inner
            .responses
            .iter()
            .filter(|r| r.sentiment.is_none())
            .cloned()
            .collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        out.truncate(limit);
        Ok(out)
    }

    async fn update_response_analysis(
        &self,
        response_id: i64,
        sentiment: Sentiment,
        links: &[String],
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let r = inner
            .responses
            .iter_mut()
            .find(|r| r.id == response_id)
            .ok_or(StoreError::NotFound { id: response_id })?;
        r.sentiment = Some(sentiment);
        r.links = links.to_vec();
        Ok(())
    }

    async fn insert_mentions(&self, response_id: i64, mentions: &[Mention]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        ensure_analysed(&inner, response_id)?;
        inner
            .mentions
            .extend(mentions.iter().map(|m| BrandMention::from_mention(response_id, m)));
        Ok(())
    }

    async fn persist_analysis(
        &self,
        response_id: i64,
        sentiment: Sentiment,
        links: &[String],
        mentions: &[Mention],
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let r = inner
            .responses
            .iter_mut()
            .find(|r| r.id == response_id)
            .ok_or(StoreError::NotFound { id: response_id })?;
        r.sentiment = Some(sentiment);
        r.links = links.to_vec();
        inner
            .mentions
            .extend(mentions.iter().map(|m| BrandMention::from_mention(response_id, m)));
        Ok(())
    }

    async fn windowed_sentiment_counts(
        &self,
        ai_sources: &[String],
        window: Duration,
    ) -> Result<Vec<SourceSentimentCount>, StoreError> {
        let since = window_start(window);
        let inner = self.lock();

        let mut out = Vec::new();
        for src in ai_sources {
            let in_window = inner
                .responses
                .iter()
                .filter(|r| &r.ai_name == src && r.timestamp >= since);
            let (total, negative) = in_window.fold((0u64, 0u64), |(t, n), r| {
                (t + 1, n + u64::from(r.sentiment == Some(Sentiment::Negative)))
            });
            if total > 0 {
                out.push(SourceSentimentCount {
                    ai_name: src.clone(),
                    total,
                    negative,
                });
            }
        }
        Ok(out)
    }

    async fn windowed_mention_counts(
        &self,
        brands: &[String],
        ai_sources: &[String],
        window: Duration,
    ) -> Result<Vec<MentionCount>, StoreError> {
        let since = window_start(window);
        let inner = self.lock();

        let mut out = Vec::new();
        for brand in brands {
            let brand_lower = brand.to_lowercase();
            for src in ai_sources {
                let count = inner
                    .mentions
                    .iter()
                    .filter(|m| m.brand_name.to_lowercase() == brand_lower)
                    .filter(|m| {
                        inner.responses.iter().any(|r| {
                            r.id == m.ai_response_id && &r.ai_name == src && r.timestamp >= since
                        })
                    })
                    .count() as u64;
                if count > 0 {
                    out.push(MentionCount {
                        brand_name: brand.clone(),
                        ai_name: src.clone(),
                        count,
                    });
                }
            }
        }
        Ok(out)
    }

    async fn windowed_keyword_matches(
        &self,
        ai_sources: &[String],
        pattern: &str,
        window: Duration,
        limit: usize,
    ) -> Result<KeywordMatches, StoreError> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| StoreError::Query {
                message: format!("invalid keyword pattern: {e}"),
            })?;
        let since = window_start(window);
        let inner = self.lock();

        let mut hits: Vec<&AiResponse> = inner
            .responses
            .iter()
            .filter(|r| r.timestamp >= since && ai_sources.contains(&r.ai_name))
            .filter(|r| re.is_match(&r.response_text) || re.is_match(&r.query_text))
            .collect();
        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        Ok(KeywordMatches {
            total: hits.len() as u64,
            recent: hits
                .into_iter()
                .take(limit)
                .map(|r| KeywordMatch {
                    ai_name: r.ai_name.clone(),
                    query_text: r.query_text.clone(),
                    response_text: r.response_text.clone(),
                    timestamp: r.timestamp,
                })
                .collect(),
        })
    }

    async fn append_alert_log(&self, entry: &AlertLogEntry) -> Result<(), StoreError> {
        self.lock().alert_log.push(entry.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
