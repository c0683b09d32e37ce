// src/analyze/mod.rs
//! Text analysis pipeline: normalization, sentiment, entities, topics, embeddings,
//! brand mentions, and the `DataProcessor` that persists the results.
//!
//! `TextAnalyzer` is the fault-tolerant boundary. Each capability is a strategy
//! trait; a missing or failing backend resolves to a documented default
//! (fallback sentiment, no entities, no topics, no embedding) and never
//! surfaces as an error to the caller.

pub mod embed;
pub mod mentions;
pub mod ner;
pub mod normalize;
pub mod pipeline;
pub mod sentiment;
pub mod similar;
pub mod topics;

use std::sync::Arc;
use tracing::warn;

// Re-export convenient types.
pub use crate::analyze::embed::{Embedder, HashingEmbedder};
pub use crate::analyze::mentions::{BrandMentionDetector, Mention, MentionType};
pub use crate::analyze::ner::{Entity, EntityExtractor, NoEntities, PatternEntityExtractor};
pub use crate::analyze::pipeline::{BatchReport, DataProcessor, ProcessedResponse};
pub use crate::analyze::sentiment::{
    LexiconSentiment, Sentiment, SentimentBackend, SentimentScores, UnavailableSentiment,
};
pub use crate::analyze::similar::{ResponseMeta, SimilarResponse, SimilarityIndex};

/// Failure inside an analysis backend. Never leaves `TextAnalyzer`.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("no analysable content")]
    Empty,
    #[error("analysis backend failed: {0}")]
    Backend(String),
}

pub struct TextAnalyzer {
    sentiment: Arc<dyn SentimentBackend>,
    entities: Arc<dyn EntityExtractor>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl Default for TextAnalyzer {
    /// Lexicon sentiment, no entity backend, hashing embeddings.
    fn default() -> Self {
        Self {
            sentiment: Arc::new(LexiconSentiment::new()),
            entities: Arc::new(NoEntities),
            embedder: Some(Arc::new(HashingEmbedder::default())),
        }
    }
}

impl TextAnalyzer {
    /// Default backends plus entity patterns from the config dir (see `ner`).
    pub fn from_default_config() -> Self {
        Self::default().with_entities(Arc::new(PatternEntityExtractor::from_default_dir()))
    }

    pub fn with_sentiment(mut self, backend: Arc<dyn SentimentBackend>) -> Self {
        self.sentiment = backend;
        self
    }

    pub fn with_entities(mut self, extractor: Arc<dyn EntityExtractor>) -> Self {
        self.entities = extractor;
        self
    }

    pub fn with_embedder(mut self, embedder: Option<Arc<dyn Embedder>>) -> Self {
        self.embedder = embedder;
        self
    }

    /// Markup, URLs and extra whitespace removed. Possibly empty.
    pub fn normalize(&self, text: &str) -> String {
        normalize::normalize_text(text)
    }

    /// Distribution over positive/negative/neutral.
    /// Empty input or any backend failure yields `SentimentScores::FALLBACK`.
    pub fn analyze_sentiment(&self, text: &str) -> SentimentScores {
        let norm = self.normalize(text);
        if norm.is_empty() {
            return SentimentScores::FALLBACK;
        }

        match self.sentiment.score(&norm) {
            Ok(s) if is_valid(&s) => s,
            Ok(s) => {
                warn!(target: "analyze", backend = self.sentiment.name(), scores = ?s, "invalid sentiment distribution");
                SentimentScores::FALLBACK
            }
            Err(AnalysisError::Empty) => SentimentScores::FALLBACK,
            Err(e) => {
                warn!(target: "analyze", backend = self.sentiment.name(), error = %e, "sentiment fallback");
                SentimentScores::FALLBACK
            }
        }
    }

    /// Best-effort entities; empty on failure or without a backend.
    pub fn extract_entities(&self, text: &str) -> Vec<Entity> {
        self.entities.extract(text).unwrap_or_else(|e| {
            warn!(target: "analyze", backend = self.entities.name(), error = %e, "entity extraction failed");
            Vec::new()
        })
    }

    /// Up to `k` groups of representative terms; empty on failure.
    pub fn extract_topics<S: AsRef<str>>(&self, texts: &[S], k: usize) -> Vec<Vec<String>> {
        topics::extract_topics(texts, k).unwrap_or_else(|e| {
            warn!(target: "analyze", error = %e, docs = texts.len(), "topic extraction failed");
            Vec::new()
        })
    }

    /// Fixed-length vector, or `None` without a backend / on failure.
    pub fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text) {
            Ok(v) => Some(v),
            Err(AnalysisError::Empty) => None,
            Err(e) => {
                warn!(target: "analyze", backend = embedder.name(), error = %e, "embedding failed");
                None
            }
        }
    }
}

fn is_valid(s: &SentimentScores) -> bool {
    let parts = [s.positive, s.negative, s.neutral];
    parts.iter().all(|p| p.is_finite() && (0.0..=1.0).contains(p))
        && (parts.iter().sum::<f64>() - 1.0).abs() < 0.05
}

/// Short SHA-256 prefix identifying a text in logs without logging the text.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
