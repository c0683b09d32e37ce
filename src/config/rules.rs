// src/config/rules.rs
//! Rule validation and the documented default rule set.

use lettre::Address;
use regex::RegexBuilder;
use std::collections::HashSet;

use super::ConfigError;
use crate::alerts::conditions::keyword_pattern;
use crate::alerts::{AlertRule, ConditionType};

const DEFAULT_SOURCES: [&str; 3] = ["ChatGPT", "Gemini", "Claude"];
const DEFAULT_RECIPIENT: &str = "admin@example.com";

fn invalid(rule: &AlertRule, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidRule {
        rule: rule.name.clone(),
        reason: reason.into(),
    }
}

pub fn validate_rule(rule: &AlertRule) -> Result<(), ConfigError> {
    if rule.name.trim().is_empty() {
        return Err(invalid(rule, "name must not be empty"));
    }
    if !rule.threshold.is_finite() || rule.threshold < 0.0 {
        return Err(invalid(rule, "threshold must be a finite, non-negative number"));
    }
    if rule.ai_sources.iter().all(|s| s.trim().is_empty()) {
        return Err(invalid(rule, "ai_sources must not be empty"));
    }

    match rule.condition_type {
        ConditionType::SentimentThreshold => {
            if rule.threshold > 1.0 {
                return Err(invalid(rule, "sentiment threshold is a ratio and must be <= 1"));
            }
        }
        ConditionType::MentionCount | ConditionType::KeywordDetection => {
            if rule.brand_keywords.is_empty() {
                return Err(invalid(rule, "brand_keywords must not be empty"));
            }
            if rule.brand_keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(invalid(rule, "brand_keywords must not contain blank entries"));
            }
        }
    }

    if rule.condition_type == ConditionType::KeywordDetection {
        let re = RegexBuilder::new(&keyword_pattern(&rule.brand_keywords))
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::InvalidPattern {
                rule: rule.name.clone(),
                source,
            })?;
        // A pattern that matches empty text matches every response.
        if re.is_match("") {
            return Err(invalid(rule, "keyword pattern matches empty text"));
        }
    }

    for address in &rule.recipients {
        if address.trim().parse::<Address>().is_err() {
            return Err(ConfigError::InvalidRecipient {
                rule: rule.name.clone(),
                address: address.clone(),
            });
        }
    }
    Ok(())
}

/// Every rule valid and names unique.
pub fn validate_rules(rules: &[AlertRule]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for rule in rules {
        validate_rule(rule)?;
        if !seen.insert(rule.name.as_str()) {
            return Err(ConfigError::DuplicateRule(rule.name.clone()));
        }
    }
    Ok(())
}

/// Three rules over ChatGPT, Gemini and Claude, all notifying admin@example.com:
/// - "Negative sentiment surge": negative ratio >= 0.7
/// - "Brand mention surge": >= 10 mentions of a watched brand
/// - "Competitor keyword detection": any response naming a competitor
pub fn default_rules() -> Vec<AlertRule> {
    let sources: Vec<String> = DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect();
    let brands: Vec<String> = ["Python", "machine learning", "AI development"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let recipients = vec![DEFAULT_RECIPIENT.to_string()];

    vec![
        AlertRule {
            name: "Negative sentiment surge".into(),
            condition_type: ConditionType::SentimentThreshold,
            threshold: 0.7,
            brand_keywords: brands.clone(),
            ai_sources: sources.clone(),
            recipients: recipients.clone(),
            active: true,
        },
        AlertRule {
            name: "Brand mention surge".into(),
            condition_type: ConditionType::MentionCount,
            threshold: 10.0,
            brand_keywords: brands,
            ai_sources: sources.clone(),
            recipients: recipients.clone(),
            active: true,
        },
        AlertRule {
            name: "Competitor keyword detection".into(),
            condition_type: ConditionType::KeywordDetection,
            threshold: 1.0,
            brand_keywords: vec!["competitor".into(), "rival".into(), "alternative".into()],
            ai_sources: sources,
            recipients,
            active: true,
        },
    ]
}
