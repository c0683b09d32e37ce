// src/analyze/topics.rs
//! Topic groups over a batch of texts: TF-IDF (unigrams + bigrams, English stop
//! words, capped vocabulary) clustered with a deterministic k-means.
//!
//! Each group is the list of highest-weighted terms of one cluster centroid.

use std::collections::{BTreeMap, HashMap};

use super::normalize::normalize_text;
use super::sentiment::tokenize;
use super::AnalysisError;

/// Vocabulary cap (most frequent terms across the corpus).
pub const MAX_FEATURES: usize = 100;
/// Representative terms reported per group.
pub const TERMS_PER_TOPIC: usize = 10;

const KMEANS_MAX_ITER: usize = 50;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him",
    "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "may", "me",
    "might", "more", "most", "much", "must", "my", "no", "nor", "not", "now", "of", "off", "on",
    "once", "one", "only", "or", "other", "our", "ours", "out", "over", "own", "same", "she",
    "should", "so", "some", "such", "than", "that", "the", "their", "theirs", "them", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "us", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "would", "you", "your", "yours",
];

fn is_stop_word(w: &str) -> bool {
    STOP_WORDS.binary_search(&w).is_ok()
}

/// Unigrams + bigrams for one document, after stop-word removal.
fn terms(text: &str) -> Vec<String> {
    let words: Vec<String> = tokenize(&normalize_text(text))
        .filter(|w| w.chars().count() >= 2 && !is_stop_word(w))
        .collect();

    let mut out = words.clone();
    out.extend(words.windows(2).map(|w| format!("{} {}", w[0], w[1])));
    out
}

/// Cluster `texts` into at most `k` groups of representative terms.
///
/// Returns `min(k, texts.len())` groups. Fails when the batch carries no usable terms.
pub fn extract_topics<S: AsRef<str>>(texts: &[S], k: usize) -> Result<Vec<Vec<String>>, AnalysisError> {
    if k == 0 || texts.is_empty() {
        return Ok(Vec::new());
    }

    let docs: Vec<Vec<String>> = texts.iter().map(|t| terms(t.as_ref())).collect();

    // Vocabulary: top MAX_FEATURES by corpus frequency, then alphabetical feature order.
    let mut corpus_tf: BTreeMap<&str, usize> = BTreeMap::new();
    for d in &docs {
        for t in d {
            *corpus_tf.entry(t.as_str()).or_default() += 1;
        }
    }
    if corpus_tf.is_empty() {
        return Err(AnalysisError::Empty);
    }
    let mut ranked: Vec<(&str, usize)> = corpus_tf.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.truncate(MAX_FEATURES);
    let mut vocab: Vec<String> = ranked.into_iter().map(|(t, _)| t.to_string()).collect();
    vocab.sort();
    let index: HashMap<&str, usize> = vocab.iter().enumerate().map(|(i, t)| (t.as_str(), i)).collect();

    let matrix = tfidf(&docs, &index, vocab.len());
    let k = k.min(matrix.len());
    let (centroids, _) = kmeans(&matrix, k);

    let topics = centroids
        .iter()
        .map(|c| {
            let mut idx: Vec<usize> = (0..c.len()).filter(|&i| c[i] > 0.0).collect();
            idx.sort_by(|&a, &b| c[b].total_cmp(&c[a]).then(a.cmp(&b)));
            idx.into_iter()
                .take(TERMS_PER_TOPIC)
                .map(|i| vocab[i].clone())
                .collect()
        })
        .collect();

    Ok(topics)
}

/// Smoothed TF-IDF rows, L2-normalised.
fn tfidf(docs: &[Vec<String>], index: &HashMap<&str, usize>, dim: usize) -> Vec<Vec<f64>> {
    let n = docs.len() as f64;
    let mut df = vec![0usize; dim];
    let mut counts: Vec<Vec<f64>> = Vec::with_capacity(docs.len());

    for d in docs {
        let mut row = vec![0.0; dim];
        for t in d {
            if let Some(&i) = index.get(t.as_str()) {
                row[i] += 1.0;
            }
        }
        for (i, v) in row.iter().enumerate() {
            if *v > 0.0 {
                df[i] += 1;
            }
        }
        counts.push(row);
    }

    let idf: Vec<f64> = df
        .iter()
        .map(|&f| ((1.0 + n) / (1.0 + f as f64)).ln() + 1.0)
        .collect();

    for row in counts.iter_mut() {
        for (v, w) in row.iter_mut().zip(&idf) {
            *v *= w;
        }
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            row.iter_mut().for_each(|v| *v /= norm);
        }
    }
    counts
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Lloyd's k-means with farthest-first seeding from row 0. Deterministic.
/// Returns `(centroids, assignment per row)`.
fn kmeans(rows: &[Vec<f64>], k: usize) -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut centroids: Vec<Vec<f64>> = vec![rows[0].clone()];
    while centroids.len() < k {
        let mut best = (0usize, -1.0f64);
        for (i, r) in rows.iter().enumerate() {
            let d = centroids
                .iter()
                .map(|c| sq_dist(r, c))
                .fold(f64::INFINITY, f64::min);
            if d > best.1 {
                best = (i, d);
            }
        }
        centroids.push(rows[best.0].clone());
    }

    let dim = rows[0].len();
    let mut assign = vec![usize::MAX; rows.len()];

    for _ in 0..KMEANS_MAX_ITER {
        let mut changed = false;
        for (i, r) in rows.iter().enumerate() {
            let mut best = (0usize, f64::INFINITY);
            for (c, cent) in centroids.iter().enumerate() {
                let d = sq_dist(r, cent);
                if d < best.1 {
                    best = (c, d);
                }
            }
            if assign[i] != best.0 {
                assign[i] = best.0;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        for (c, cent) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f64>> = rows
                .iter()
                .zip(&assign)
                .filter(|(_, a)| **a == c)
                .map(|(r, _)| r)
                .collect();
            if members.is_empty() {
                continue; // keep previous centroid
            }
            let mut mean = vec![0.0; dim];
            for m in &members {
                for (acc, v) in mean.iter_mut().zip(m.iter()) {
                    *acc += v;
                }
            }
            let len = members.len() as f64;
            mean.iter_mut().for_each(|v| *v /= len);
            *cent = mean;
        }
    }

    (centroids, assign)
}
