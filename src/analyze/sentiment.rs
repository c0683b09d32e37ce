// src/analyze/sentiment.rs
//! Sentiment scoring strategies.
//!
//! A backend turns text into a probability-like distribution over
//! `positive | negative | neutral`. Backends may fail; the `TextAnalyzer`
//! facade resolves every failure to `SentimentScores::FALLBACK`.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::AnalysisError;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

/// Longest prefix (in chars) a backend looks at.
pub const MAX_INPUT_CHARS: usize = 512;

/// Baseline neutral mass, plus a small amount per token without lexicon hit.
const NEUTRAL_PRIOR: f64 = 1.0;
const NEUTRAL_PER_TOKEN: f64 = 0.1;

/// Discrete sentiment label persisted on responses and mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(AnalysisError::Backend(format!("unknown sentiment label: {other}"))),
        }
    }
}

/// Distribution over the three labels, summing to ~1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScores {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl SentimentScores {
    /// Neutral-leaning default used whenever a backend cannot answer.
    pub const FALLBACK: SentimentScores = SentimentScores {
        positive: 0.33,
        negative: 0.33,
        neutral: 0.34,
    };

    /// Label with the highest score. Ties keep the earlier label
    /// in the order positive, negative, neutral.
    pub fn dominant(&self) -> Sentiment {
        let mut best = (Sentiment::Positive, self.positive);
        for (label, score) in [
            (Sentiment::Negative, self.negative),
            (Sentiment::Neutral, self.neutral),
        ] {
            if score > best.1 {
                best = (label, score);
            }
        }
        best.0
    }

    pub fn get(&self, label: Sentiment) -> f64 {
        match label {
            Sentiment::Positive => self.positive,
            Sentiment::Negative => self.negative,
            Sentiment::Neutral => self.neutral,
        }
    }
}

/// Pluggable sentiment model.
pub trait SentimentBackend: Send + Sync {
    fn score(&self, text: &str) -> Result<SentimentScores, AnalysisError>;
    fn name(&self) -> &'static str;
}

/// Lexicon scorer with short-range negation (embedded `sentiment_lexicon.json`).
#[derive(Debug, Clone, Default)]
pub struct LexiconSentiment;

impl LexiconSentiment {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns `(positive mass, negative mass, tokens without a lexicon hit, token count)`.
    /// A negator within the previous 1..=3 tokens flips the sign of a word.
    fn masses(&self, text: &str) -> (f64, f64, usize, usize) {
        let head: String = text.chars().take(MAX_INPUT_CHARS).collect();
        let tokens: Vec<String> = tokenize(&head).collect();

        let mut pos = 0.0;
        let mut neg = 0.0;
        let mut unmatched = 0usize;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                if !is_negator(tokens[i].as_str()) {
                    unmatched += 1;
                }
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            let adj = if negated { -base } else { base };
            if adj > 0 {
                pos += adj as f64;
            } else {
                neg += (-adj) as f64;
            }
        }

        (pos, neg, unmatched, tokens.len())
    }
}

impl SentimentBackend for LexiconSentiment {
    fn score(&self, text: &str) -> Result<SentimentScores, AnalysisError> {
        let (pos, neg, unmatched, n) = self.masses(text);
        if n == 0 {
            return Err(AnalysisError::Empty);
        }

        let neu = NEUTRAL_PRIOR + unmatched as f64 * NEUTRAL_PER_TOKEN;
        let total = pos + neg + neu;
        Ok(SentimentScores {
            positive: pos / total,
            negative: neg / total,
            neutral: neu / total,
        })
    }

    fn name(&self) -> &'static str {
        "lexicon"
    }
}

/// Stand-in when no model is installed; always reports unavailability.
#[derive(Debug, Clone, Default)]
pub struct UnavailableSentiment;

impl SentimentBackend for UnavailableSentiment {
    fn score(&self, _text: &str) -> Result<SentimentScores, AnalysisError> {
        Err(AnalysisError::Backend("no sentiment backend configured".into()))
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// Alphanumeric tokens, lower-cased.
pub(crate) fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

// Contractions arrive split by the tokenizer ("isn't" -> "isn", "t").
fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn"
            | "wasn"
            | "aren"
            | "don"
            | "doesn"
            | "didn"
            | "cannot"
            | "without"
            | "hardly"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum(s: &SentimentScores) -> f64 {
        s.positive + s.negative + s.neutral
    }

    #[test]
    fn distribution_sums_to_one() {
        let s = LexiconSentiment::new()
            .score("Acme is a great and reliable choice")
            .unwrap();
        assert!((sum(&s) - 1.0).abs() < 1e-9);
        assert_eq!(s.dominant(), Sentiment::Positive);
    }

    #[test]
    fn negative_words_dominate_short_text() {
        let s = LexiconSentiment::new()
            .score("Terrible support, awful bugs")
            .unwrap();
        assert_eq!(s.dominant(), Sentiment::Negative);
    }

    #[test]
    fn negation_flips_sign() {
        let plain = LexiconSentiment::new().score("it is good").unwrap();
        let negated = LexiconSentiment::new().score("it is not good").unwrap();
        assert!(plain.positive > plain.negative);
        assert!(negated.negative > negated.positive);
    }

    #[test]
    fn no_tokens_is_an_error() {
        assert!(matches!(
            LexiconSentiment::new().score("!!! ..."),
            Err(AnalysisError::Empty)
        ));
    }

    #[test]
    fn plain_text_leans_neutral() {
        let s = LexiconSentiment::new()
            .score("The library was released in 1991 by a team in Amsterdam")
            .unwrap();
        assert_eq!(s.dominant(), Sentiment::Neutral);
    }

    #[test]
    fn fallback_dominant_is_neutral() {
        assert_eq!(SentimentScores::FALLBACK.dominant(), Sentiment::Neutral);
    }

    #[test]
    fn labels_round_trip_through_strings() {
        for l in [Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral] {
            assert_eq!(l.as_str().parse::<Sentiment>().unwrap(), l);
        }
        assert!("angry".parse::<Sentiment>().is_err());
    }
}
