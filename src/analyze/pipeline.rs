// src/analyze/pipeline.rs
//! Response analysis pipeline.
//!
//! For one stored response: sentiment distribution and dominant label, entities,
//! brand mentions, links. Persisted as analysis fields first and mentions
//! second, so a mention never exists for a response without sentiment.

use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::mentions::{BrandMentionDetector, Mention};
use super::ner::Entity;
use super::normalize::{extract_links, strip_markup};
use super::sentiment::{Sentiment, SentimentScores};
use super::similar::{ResponseMeta, SimilarResponse, SimilarityIndex};
use super::{anon_hash, TextAnalyzer};
use crate::store::{AiResponse, ResponseStore, StoreError};

pub const DEFAULT_BATCH_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedResponse {
    pub response_id: i64,
    pub sentiment: Sentiment,
    pub scores: SentimentScores,
    pub entities: Vec<Entity>,
    pub mentions: Vec<Mention>,
    pub links: Vec<String>,
    pub embedded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub failed: usize,
}

pub struct DataProcessor {
    analyzer: Arc<TextAnalyzer>,
    detector: BrandMentionDetector,
    store: Arc<dyn ResponseStore>,
    index: Option<Arc<SimilarityIndex>>,
    batch_limit: usize,
}

impl DataProcessor {
    pub fn new<I, S>(analyzer: Arc<TextAnalyzer>, brand_keywords: I, store: Arc<dyn ResponseStore>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        crate::metrics::ensure_metrics_described();
        Self {
            detector: BrandMentionDetector::new(brand_keywords, analyzer.clone()),
            analyzer,
            store,
            index: None,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }

    pub fn with_index(mut self, index: Arc<SimilarityIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    pub fn with_context_window(mut self, chars: usize) -> Self {
        self.detector = self.detector.with_context_window(chars);
        self
    }

    pub fn detector(&self) -> &BrandMentionDetector {
        &self.detector
    }

    /// Analyse one response and persist the result.
    pub async fn process_response(&self, resp: &AiResponse) -> Result<ProcessedResponse, StoreError> {
        let normalized = self.analyzer.normalize(&resp.response_text);
        let scores = self.analyzer.analyze_sentiment(&resp.response_text);
        let sentiment = scores.dominant();
        let entities = self.analyzer.extract_entities(&normalized);

        // Detection keeps URLs so link mentions stay recognisable.
        let mentions = self.detector.detect(&strip_markup(&resp.response_text));
        let links = extract_links(&resp.response_text);

        self.store
            .persist_analysis(resp.id, sentiment, &links, &mentions)
            .await?;

        let mut embedded = false;
        if let Some(index) = &self.index {
            if let Some(v) = self.analyzer.embed(&normalized) {
                index.add(
                    resp.id,
                    v,
                    ResponseMeta {
                        ai_name: resp.ai_name.clone(),
                        query_text: resp.query_text.clone(),
                        sentiment,
                    },
                );
                embedded = true;
            }
        }

        debug!(
            target: "analyze",
            id = resp.id,
            ai = %resp.ai_name,
            text = %anon_hash(&resp.response_text),
            sentiment = %sentiment,
            entities = entities.len(),
            mentions = mentions.len(),
            links = links.len(),
            "response processed"
        );

        Ok(ProcessedResponse {
            response_id: resp.id,
            sentiment,
            scores,
            entities,
            mentions,
            links,
            embedded,
        })
    }

    /// Process up to `batch_limit` unanalysed responses, newest first.
    /// A failing response is logged and counted; the batch continues.
    pub async fn batch_process_unprocessed(&self) -> Result<BatchReport, StoreError> {
        let pending = self.store.fetch_unprocessed(self.batch_limit).await?;
        let mut report = BatchReport::default();

        for resp in &pending {
            match self.process_response(resp).await {
                Ok(_) => {
                    report.processed += 1;
                    counter!("responses_processed_total").increment(1);
                }
                Err(e) => {
                    report.failed += 1;
                    counter!("responses_failed_total").increment(1);
                    warn!(target: "analyze", id = resp.id, error = %e, "response processing failed");
                }
            }
        }

        info!(
            target: "analyze",
            fetched = pending.len(),
            processed = report.processed,
            failed = report.failed,
            "batch processed"
        );
        Ok(report)
    }

    /// Responses most similar to `text`; empty without an index or embedding.
    pub fn search_similar(&self, text: &str, n: usize) -> Vec<SimilarResponse> {
        let Some(index) = &self.index else {
            return Vec::new();
        };
        match self.analyzer.embed(&self.analyzer.normalize(text)) {
            Some(q) => index.search(&q, n),
            None => Vec::new(),
        }
    }
}
