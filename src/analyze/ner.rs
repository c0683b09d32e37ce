// src/analyze/ner.rs
//! Entity extraction from JSON pattern configs.
//!
//! Every `*.json` file in the config dir (`NER_CONFIG_DIR`, or `<cwd>/config/entities`)
//! holds a list of `{ "regex": ... }` patterns. The file stem, upper-cased, is the entity
//! label (`org.json` -> `ORG`). Patterns are compiled once at construction.
//!
//! A missing dir, unreadable file or invalid regex is skipped: extraction is
//! best-effort and an extractor without patterns returns no entities.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::AnalysisError;

pub const ENV_NER_CONFIG_DIR: &str = "NER_CONFIG_DIR";

/// One extracted entity; `start..end` is a byte span into the analysed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: String,
    pub start: usize,
    pub end: usize,
}

pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Result<Vec<Entity>, AnalysisError>;
    fn name(&self) -> &'static str;
}

/// Extractor used when no backend is available.
#[derive(Debug, Clone, Default)]
pub struct NoEntities;

impl EntityExtractor for NoEntities {
    fn extract(&self, _text: &str) -> Result<Vec<Entity>, AnalysisError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

#[derive(Debug, Deserialize)]
struct Pattern {
    /// Regex string (compatible with the `regex` crate).
    regex: String,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    patterns: Vec<Pattern>,
}

#[derive(Debug, Default)]
pub struct PatternEntityExtractor {
    patterns: Vec<(String, Regex)>,
}

/// Resolve the directory containing entity configs.
pub fn ner_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_NER_CONFIG_DIR) {
        return PathBuf::from(dir);
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config")
        .join("entities")
}

impl PatternEntityExtractor {
    pub fn from_default_dir() -> Self {
        Self::from_dir(&ner_config_dir())
    }

    pub fn from_dir(dir: &Path) -> Self {
        let mut patterns = Vec::new();

        let Ok(read_dir) = fs::read_dir(dir) else {
            return Self { patterns }; // Missing dir is ok → just no entities
        };

        let mut paths: Vec<PathBuf> = read_dir.flatten().map(|e| e.path()).collect();
        paths.sort();

        for path in paths {
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let label = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("unknown")
                .to_ascii_uppercase();

            let Ok(content) = fs::read_to_string(&path) else {
                warn!(target: "analyze", path = %path.display(), "unreadable entity config");
                continue;
            };
            let Ok(cfg) = serde_json::from_str::<ConfigFile>(&content) else {
                warn!(target: "analyze", path = %path.display(), "invalid entity config");
                continue;
            };

            for pat in cfg.patterns {
                match Regex::new(&pat.regex) {
                    Ok(re) => patterns.push((label.clone(), re)),
                    Err(e) => {
                        warn!(target: "analyze", label = %label, error = %e, "skipping entity pattern")
                    }
                }
            }
        }

        Self { patterns }
    }

    /// Build from `(label, regex)` pairs; fails on the first invalid regex.
    pub fn from_patterns<'a, I>(pairs: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut patterns = Vec::new();
        for (label, re) in pairs {
            patterns.push((label.to_string(), Regex::new(re)?));
        }
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl EntityExtractor for PatternEntityExtractor {
    fn extract(&self, text: &str) -> Result<Vec<Entity>, AnalysisError> {
        let mut out = Vec::new();
        for (label, re) in &self.patterns {
            for m in re.find_iter(text) {
                out.push(Entity {
                    text: m.as_str().to_string(),
                    label: label.clone(),
                    start: m.start(),
                    end: m.end(),
                });
            }
        }

        out.sort_by(|a, b| (a.start, a.end, &a.label).cmp(&(b.start, b.end, &b.label)));
        out.dedup_by(|a, b| a.start == b.start && a.end == b.end && a.label == b.label);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "patterns"
    }
}
