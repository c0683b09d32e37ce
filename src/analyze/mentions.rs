// src/analyze/mentions.rs
//! Brand mention detection.
//!
//! A keyword matches when its lower-cased form is a substring of the lower-cased
//! text. Every matching keyword yields one `Mention` carrying the sentiment of the
//! whole text and a context window around the keyword's first occurrence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::normalize::contains_url;
use super::sentiment::{Sentiment, SentimentScores};
use super::TextAnalyzer;

/// Characters kept on each side of the keyword.
pub const DEFAULT_CONTEXT_WINDOW: usize = 100;
/// Context returned when the keyword cannot be located.
const CONTEXT_HEAD_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MentionType {
    Direct,
    Link,
    /// Representable for stored data; detection never produces it.
    Implied,
}

impl MentionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MentionType::Direct => "direct",
            MentionType::Link => "link",
            MentionType::Implied => "implied",
        }
    }
}

impl fmt::Display for MentionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    /// Keyword as configured (original spelling).
    pub brand_name: String,
    pub mention_type: MentionType,
    pub sentiment: Sentiment,
    pub sentiment_scores: SentimentScores,
    pub context: String,
}

#[derive(Debug, Clone)]
struct Keyword {
    display: String,
    lower: String,
}

pub struct BrandMentionDetector {
    keywords: Vec<Keyword>,
    analyzer: Arc<TextAnalyzer>,
    context_window: usize,
}

impl BrandMentionDetector {
    /// Keywords are trimmed and lower-cased once here; blanks and duplicates are dropped.
    pub fn new<I, S>(keywords: I, analyzer: Arc<TextAnalyzer>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<Keyword> = Vec::new();
        for k in keywords {
            let display = k.as_ref().trim().to_string();
            let lower = display.to_lowercase();
            if lower.is_empty() || out.iter().any(|x| x.lower == lower) {
                continue;
            }
            out.push(Keyword { display, lower });
        }
        Self {
            keywords: out,
            analyzer,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }

    pub fn with_context_window(mut self, chars: usize) -> Self {
        self.context_window = chars;
        self
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|k| k.display.as_str())
    }

    /// All mentions in `text`, in configured keyword order.
    pub fn detect(&self, text: &str) -> Vec<Mention> {
        let lower = text.to_lowercase();
        let matched: Vec<&Keyword> = self
            .keywords
            .iter()
            .filter(|k| lower.contains(&k.lower))
            .collect();
        if matched.is_empty() {
            return Vec::new();
        }

        // Whole-text sentiment, shared by every mention.
        let scores = self.analyzer.analyze_sentiment(text);
        let sentiment = scores.dominant();

        matched
            .into_iter()
            .map(|k| Mention {
                brand_name: k.display.clone(),
                mention_type: classify_mention_type(text, &lower, &k.lower),
                sentiment,
                sentiment_scores: scores,
                context: extract_context(text, &k.lower, self.context_window),
            })
            .collect()
    }
}

fn classify_mention_type(text: &str, lower: &str, keyword: &str) -> MentionType {
    if contains_url(text) && lower.contains(keyword) {
        return MentionType::Link;
    }
    if lower.contains(keyword) {
        return MentionType::Direct;
    }
    MentionType::Implied
}

/// `window` chars on each side of the first case-insensitive occurrence of `keyword`.
/// Works on chars so multi-byte text is never split mid-character.
pub fn extract_context(text: &str, keyword_lower: &str, window: usize) -> String {
    let chars: Vec<char> = text.chars().collect();

    // Lowercased text plus, for each of its bytes, the index of the source char.
    // Lowercasing can change length ('İ' becomes two chars), so offsets are mapped back.
    let mut lower = String::with_capacity(text.len());
    let mut owner: Vec<usize> = Vec::with_capacity(text.len());
    for (i, c) in chars.iter().enumerate() {
        let before = lower.len();
        lower.extend(c.to_lowercase());
        owner.resize(owner.len() + (lower.len() - before), i);
    }

    let span = if keyword_lower.is_empty() {
        None
    } else {
        lower
            .find(keyword_lower)
            .map(|b| (owner[b], owner[b + keyword_lower.len() - 1] + 1))
    };

    let Some((first, last)) = span else {
        return chars.iter().take(CONTEXT_HEAD_CHARS).collect();
    };

    let start = first.saturating_sub(window);
    let end = (last + window).min(chars.len());
    chars[start..end].iter().collect()
}
