// src/analyze/similar.rs
//! In-memory cosine similarity index over analysed responses.

use serde::Serialize;
use parking_lot::RwLock;
use std::collections::VecDeque;

use super::sentiment::Sentiment;

/// Metadata kept next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMeta {
    pub ai_name: String,
    pub query_text: String,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarResponse {
    pub response_id: i64,
    pub score: f32,
    pub meta: ResponseMeta,
}

#[derive(Debug)]
struct Entry {
    response_id: i64,
    embedding: Vec<f32>,
    meta: ResponseMeta,
}

/// Entries kept by `SimilarityIndex::new`.
pub const DEFAULT_INDEX_CAPACITY: usize = 10_000;

/// Bounded: once `capacity` responses are indexed, the oldest insert is evicted.
#[derive(Debug)]
pub struct SimilarityIndex {
    inner: RwLock<VecDeque<Entry>>,
    capacity: usize,
}

impl Default for SimilarityIndex {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_INDEX_CAPACITY)
    }
}

impl SimilarityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert or replace the vector stored for `response_id`.
    pub fn add(&self, response_id: i64, embedding: Vec<f32>, meta: ResponseMeta) {
        let mut v = self.inner.write();
        v.retain(|e| e.response_id != response_id);
        v.push_back(Entry {
            response_id,
            embedding,
            meta,
        });
        while v.len() > self.capacity {
            v.pop_front();
        }
    }

    /// Top `n` entries by cosine similarity, best first.
    pub fn search(&self, query: &[f32], n: usize) -> Vec<SimilarResponse> {
        let v = self.inner.read();
        let mut scored: Vec<SimilarResponse> = v
            .iter()
            .map(|e| SimilarResponse {
                response_id: e.response_id,
                score: cosine(query, &e.embedding),
                meta: e.meta.clone(),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.response_id.cmp(&b.response_id))
        });
        scored.truncate(n);
        scored
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cosine similarity; 0.0 for mismatched dimensions or zero vectors.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
