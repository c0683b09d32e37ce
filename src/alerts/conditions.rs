// src/alerts/conditions.rs
//! Pure decision functions: aggregate rows in, at most one `Alert` out.
//! The first qualifying row wins; the remaining rows are not inspected.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use super::{Alert, AlertData, AlertRule, Severity};
use crate::store::{KeywordMatches, MentionCount, SourceSentimentCount};

/// Negative ratio at or above which a sentiment alert is `high`.
pub const HIGH_RATIO: f64 = 0.8;
/// Mention count at or above which a mention alert is `high`.
pub const HIGH_MENTIONS: u64 = 20;
/// Characters of the newest keyword match embedded in the alert.
pub const LATEST_PREVIEW_CHARS: usize = 200;

pub fn ratio_severity(ratio: f64) -> Severity {
    if ratio >= HIGH_RATIO {
        Severity::High
    } else {
        Severity::Medium
    }
}

pub fn mention_severity(count: u64) -> Severity {
    if count >= HIGH_MENTIONS {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Case-insensitive alternation used by keyword detection.
pub fn keyword_pattern(keywords: &[String]) -> String {
    keywords.join("|")
}

/// Human label for the trailing window, e.g. "past 1 hour".
pub fn period_label(window: Duration) -> String {
    let secs = window.num_seconds();
    if secs > 0 && secs % 3600 == 0 {
        let h = secs / 3600;
        if h == 1 {
            "past 1 hour".to_string()
        } else {
            format!("past {h} hours")
        }
    } else if secs > 0 && secs % 60 == 0 {
        let m = secs / 60;
        if m == 1 {
            "past 1 minute".to_string()
        } else {
            format!("past {m} minutes")
        }
    } else {
        format!("past {secs} seconds")
    }
}

/// First `LATEST_PREVIEW_CHARS` characters plus "..." when longer, otherwise unchanged.
pub fn truncate_preview(text: &str) -> String {
    match text.char_indices().nth(LATEST_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

pub fn sentiment_alert(
    rule: &AlertRule,
    rows: &[SourceSentimentCount],
    window: Duration,
    now: DateTime<Utc>,
) -> Option<Alert> {
    rows.iter().find_map(|row| {
        if row.total == 0 {
            return None;
        }
        let ratio = row.negative as f64 / row.total as f64;
        if ratio < rule.threshold {
            return None;
        }

        let mut data = AlertData::new();
        data.insert("AI name".into(), Value::from(row.ai_name.clone()));
        data.insert("Total responses".into(), Value::from(row.total));
        data.insert("Negative responses".into(), Value::from(row.negative));
        data.insert("Negative ratio".into(), Value::from(percent(ratio)));
        data.insert("Period".into(), Value::from(period_label(window)));

        Some(Alert {
            rule_name: rule.name.clone(),
            message: format!(
                "Negative responses are surging on {} ({})",
                row.ai_name,
                percent(ratio)
            ),
            severity: ratio_severity(ratio),
            timestamp: now,
            data,
        })
    })
}

pub fn mention_alert(
    rule: &AlertRule,
    rows: &[MentionCount],
    window: Duration,
    now: DateTime<Utc>,
) -> Option<Alert> {
    let row = rows.iter().find(|r| r.count as f64 >= rule.threshold)?;

    let mut data = AlertData::new();
    data.insert("Brand".into(), Value::from(row.brand_name.clone()));
    data.insert("AI name".into(), Value::from(row.ai_name.clone()));
    data.insert("Mentions".into(), Value::from(row.count));
    data.insert("Period".into(), Value::from(period_label(window)));

    Some(Alert {
        rule_name: rule.name.clone(),
        message: format!(
            "Mentions of {} are surging ({} on {})",
            row.brand_name, row.count, row.ai_name
        ),
        severity: mention_severity(row.count),
        timestamp: now,
        data,
    })
}

pub fn keyword_alert(
    rule: &AlertRule,
    matches: &KeywordMatches,
    window: Duration,
    now: DateTime<Utc>,
) -> Option<Alert> {
    if (matches.total as f64) < rule.threshold {
        return None;
    }
    let keywords = rule.brand_keywords.join(", ");
    let latest = matches
        .recent
        .first()
        .map(|m| truncate_preview(&m.response_text))
        .unwrap_or_default();

    let mut data = AlertData::new();
    data.insert("Matches".into(), Value::from(matches.total));
    data.insert("Keywords".into(), Value::from(keywords.clone()));
    data.insert("Latest response".into(), Value::from(latest));
    data.insert("Period".into(), Value::from(period_label(window)));

    Some(Alert {
        rule_name: rule.name.clone(),
        message: format!("Responses containing watched keywords ({keywords}) were detected"),
        severity: Severity::Low,
        timestamp: now,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::ConditionType;
    use crate::store::KeywordMatch;

    fn rule(kind: ConditionType, threshold: f64) -> AlertRule {
        AlertRule {
            name: "r".into(),
            condition_type: kind,
            threshold,
            brand_keywords: vec!["Acme".into(), "Globex".into()],
            ai_sources: vec!["ChatGPT".into()],
            recipients: vec![],
            active: true,
        }
    }

    fn hour() -> Duration {
        Duration::hours(1)
    }

    fn src(name: &str, total: u64, negative: u64) -> SourceSentimentCount {
        SourceSentimentCount {
            ai_name: name.into(),
            total,
            negative,
        }
    }

    #[test]
    fn ratio_severity_boundary() {
        assert_eq!(ratio_severity(0.8), Severity::High);
        assert_eq!(ratio_severity(0.7999), Severity::Medium);
        assert_eq!(ratio_severity(1.0), Severity::High);
        for i in 0..=100 {
            let r = i as f64 / 100.0;
            assert_eq!(ratio_severity(r) == Severity::High, r >= 0.8, "ratio {r}");
        }
    }

    #[test]
    fn mention_severity_boundary() {
        for c in 0..40u64 {
            assert_eq!(mention_severity(c) == Severity::High, c >= 20, "count {c}");
        }
    }

    #[test]
    fn zero_total_never_alerts() {
        let r = rule(ConditionType::SentimentThreshold, 0.0);
        assert!(sentiment_alert(&r, &[src("ChatGPT", 0, 0)], hour(), Utc::now()).is_none());
    }

    #[test]
    fn sentiment_first_qualifying_source_wins() {
        let r = rule(ConditionType::SentimentThreshold, 0.5);
        let rows = [src("ChatGPT", 4, 1), src("Gemini", 4, 3), src("Claude", 2, 2)];
        let a = sentiment_alert(&r, &rows, hour(), Utc::now()).unwrap();
        assert_eq!(a.data["AI name"], "Gemini");
        assert_eq!(a.data["Negative ratio"], "75.0%");
        assert_eq!(a.severity, Severity::Medium);
        assert_eq!(a.data["Period"], "past 1 hour");
    }

    #[test]
    fn sentiment_ratio_below_threshold_is_silent() {
        let r = rule(ConditionType::SentimentThreshold, 0.7);
        assert!(sentiment_alert(&r, &[src("ChatGPT", 3, 2)], hour(), Utc::now()).is_none());
    }

    #[test]
    fn mention_alert_uses_first_pair_at_threshold() {
        let r = rule(ConditionType::MentionCount, 10.0);
        let rows = [
            MentionCount {
                brand_name: "Acme".into(),
                ai_name: "ChatGPT".into(),
                count: 9,
            },
            MentionCount {
                brand_name: "Acme".into(),
                ai_name: "Gemini".into(),
                count: 10,
            },
        ];
        let a = mention_alert(&r, &rows, hour(), Utc::now()).unwrap();
        assert_eq!(a.data["AI name"], "Gemini");
        assert_eq!(a.data["Mentions"], 10);
        assert_eq!(a.severity, Severity::Medium);
    }

    #[test]
    fn keyword_alert_truncates_latest() {
        let r = rule(ConditionType::KeywordDetection, 1.0);
        let long = "é".repeat(250);
        let m = KeywordMatches {
            total: 7,
            recent: vec![KeywordMatch {
                ai_name: "ChatGPT".into(),
                query_text: "q".into(),
                response_text: long,
                timestamp: Utc::now(),
            }],
        };
        let a = keyword_alert(&r, &m, hour(), Utc::now()).unwrap();
        let latest = a.data["Latest response"].as_str().unwrap();
        assert_eq!(latest.chars().count(), 203);
        assert!(latest.ends_with("..."));
        assert_eq!(a.data["Matches"], 7);
        assert_eq!(a.data["Keywords"], "Acme, Globex");
        assert_eq!(a.severity, Severity::Low);
    }

    #[test]
    fn keyword_alert_respects_threshold() {
        let r = rule(ConditionType::KeywordDetection, 3.0);
        let m = KeywordMatches {
            total: 2,
            recent: vec![],
        };
        assert!(keyword_alert(&r, &m, hour(), Utc::now()).is_none());
    }

    #[test]
    fn short_preview_is_unchanged() {
        assert_eq!(truncate_preview("short"), "short");
        assert_eq!(truncate_preview(&"a".repeat(200)), "a".repeat(200));
        assert_eq!(truncate_preview(&"a".repeat(201)), format!("{}...", "a".repeat(200)));
    }

    #[test]
    fn pattern_and_period_labels() {
        assert_eq!(keyword_pattern(&["Acme".into(), "Globex".into()]), "Acme|Globex");
        assert_eq!(period_label(Duration::hours(3)), "past 3 hours");
        assert_eq!(period_label(Duration::minutes(30)), "past 30 minutes");
        assert_eq!(period_label(Duration::seconds(45)), "past 45 seconds");
    }
}
