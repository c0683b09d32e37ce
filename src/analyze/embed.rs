// src/analyze/embed.rs
//! Fixed-length text embeddings.
//!
//! `HashingEmbedder` is a signed feature-hashing bag of words: every token is
//! hashed with SHA-256 into one of `dim` buckets, the vector is L2-normalised.
//! Deterministic across processes, so stored vectors stay comparable.

use sha2::{Digest, Sha256};

use super::normalize::normalize_text;
use super::sentiment::tokenize;
use super::AnalysisError;

pub const DEFAULT_DIM: usize = 384;

pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, AnalysisError>;
    fn dim(&self) -> usize;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIM)
    }
}

impl HashingEmbedder {
    /// `dim == 0` is treated as 1.
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let h = u64::from_le_bytes(head);
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        ((h % self.dim as u64) as usize, sign)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, AnalysisError> {
        let mut v = vec![0.0f32; self.dim];
        let mut n = 0usize;
        for tok in tokenize(&normalize_text(text)) {
            let (i, s) = self.bucket(&tok);
            v[i] += s;
            n += 1;
        }
        if n == 0 {
            return Err(AnalysisError::Empty);
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &'static str {
        "hashing"
    }
}
