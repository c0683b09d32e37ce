// tests/alert_engine.rs
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

use ai_brand_monitor::analyze::{Mention, MentionType, Sentiment};
use ai_brand_monitor::store::{
    AiResponse, AlertLogEntry, BrandMention, KeywordMatches, MentionCount, NewResponse,
    SourceSentimentCount,
};
use ai_brand_monitor::{
    Alert, AlertEngine, AlertRule, ConditionType, EngineConfig, MemoryStore, Notifier,
    ResponseStore, RuleOutcome, Severity, StoreError,
};

// ---------- test doubles ----------

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(Vec<String>, Alert)>>,
    fail: bool,
}

impl RecordingNotifier {
    fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn alerts(&self) -> Vec<Alert> {
        self.sent.lock().iter().map(|(_, a)| a.clone()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipients: &[String], alert: &Alert) -> anyhow::Result<()> {
        self.sent.lock().push((recipients.to_vec(), alert.clone()));
        if self.fail {
            anyhow::bail!("smtp down");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Delegates to a `MemoryStore`, but sentiment counts and alert-log appends can be made to fail.
struct FlakyStore {
    inner: MemoryStore,
    sentiment_down: bool,
    log_down: bool,
}

fn unavailable() -> StoreError {
    StoreError::Unavailable {
        message: "connection refused".into(),
    }
}

#[async_trait]
impl ResponseStore for FlakyStore {
    async fn insert_response(&self, new: NewResponse) -> Result<i64, StoreError> {
        self.inner.insert_response(new).await
    }
    async fn fetch_unprocessed(&self, limit: usize) -> Result<Vec<AiResponse>, StoreError> {
        self.inner.fetch_unprocessed(limit).await
    }
    async fn update_response_analysis(
        &self,
        id: i64,
        sentiment: Sentiment,
        links: &[String],
    ) -> Result<(), StoreError> {
        self.inner.update_response_analysis(id, sentiment, links).await
    }
    async fn insert_mentions(&self, id: i64, mentions: &[Mention]) -> Result<(), StoreError> {
        self.inner.insert_mentions(id, mentions).await
    }
    async fn persist_analysis(
        &self,
        id: i64,
        sentiment: Sentiment,
        links: &[String],
        mentions: &[Mention],
    ) -> Result<(), StoreError> {
        self.inner.persist_analysis(id, sentiment, links, mentions).await
    }
    async fn windowed_sentiment_counts(
        &self,
        sources: &[String],
        window: Duration,
    ) -> Result<Vec<SourceSentimentCount>, StoreError> {
        if self.sentiment_down {
            return Err(unavailable());
        }
        self.inner.windowed_sentiment_counts(sources, window).await
    }
    async fn windowed_mention_counts(
        &self,
        brands: &[String],
        sources: &[String],
        window: Duration,
    ) -> Result<Vec<MentionCount>, StoreError> {
        self.inner.windowed_mention_counts(brands, sources, window).await
    }
    async fn windowed_keyword_matches(
        &self,
        sources: &[String],
        pattern: &str,
        window: Duration,
        limit: usize,
    ) -> Result<KeywordMatches, StoreError> {
        self.inner
            .windowed_keyword_matches(sources, pattern, window, limit)
            .await
    }
    async fn append_alert_log(&self, entry: &AlertLogEntry) -> Result<(), StoreError> {
        if self.log_down {
            return Err(unavailable());
        }
        self.inner.append_alert_log(entry).await
    }
    fn name(&self) -> &'static str {
        "flaky"
    }
}

// ---------- helpers ----------

fn rule(name: &str, kind: ConditionType, threshold: f64, brands: &[&str], sources: &[&str]) -> AlertRule {
    AlertRule {
        name: name.into(),
        condition_type: kind,
        threshold,
        brand_keywords: brands.iter().map(|s| s.to_string()).collect(),
        ai_sources: sources.iter().map(|s| s.to_string()).collect(),
        recipients: vec!["ops@example.com".into(), "pr@example.com".into()],
        active: true,
    }
}

fn sentiment_rule() -> AlertRule {
    rule("negative surge", ConditionType::SentimentThreshold, 0.7, &[], &["ChatGPT"])
}

fn seed_sentiments(store: &MemoryStore, ai: &str, labels: &[Sentiment]) {
    let now = Utc::now();
    for (i, s) in labels.iter().enumerate() {
        store.seed_response(ai, "an answer", Some(*s), now - Duration::minutes(i as i64 + 1));
    }
}

fn seed_mentions(store: &MemoryStore, ai: &str, brand: &str, n: usize) {
    let now = Utc::now();
    for i in 0..n {
        let id = store.seed_response(ai, "text", Some(Sentiment::Neutral), now - Duration::minutes(i as i64));
        store
            .seed_mention(BrandMention {
                ai_response_id: id,
                brand_name: brand.into(),
                mention_type: MentionType::Direct,
                sentiment: Sentiment::Neutral,
                context: "ctx".into(),
            })
            .unwrap();
    }
}

fn engine(
    rules: Vec<AlertRule>,
    store: Arc<dyn ResponseStore>,
    notifier: Arc<RecordingNotifier>,
) -> AlertEngine {
    AlertEngine::new(rules, store, notifier, EngineConfig::default()).unwrap()
}

// ---------- scenarios ----------

#[tokio::test]
async fn two_of_three_negative_stays_below_threshold() {
    let store = Arc::new(MemoryStore::new());
    seed_sentiments(
        &store,
        "ChatGPT",
        &[Sentiment::Negative, Sentiment::Negative, Sentiment::Neutral],
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let e = engine(vec![sentiment_rule()], store.clone(), notifier.clone());

    let report = e.run_cycle().await;
    assert_eq!(report.outcome("negative surge"), Some(&RuleOutcome::NoAlert));
    assert!(notifier.alerts().is_empty());
    assert!(store.alert_log().is_empty());
}

#[tokio::test]
async fn all_negative_triggers_high_alert_and_logs_it() {
    let store = Arc::new(MemoryStore::new());
    seed_sentiments(&store, "ChatGPT", &[Sentiment::Negative; 3]);
    let notifier = Arc::new(RecordingNotifier::default());
    let e = engine(vec![sentiment_rule()], store.clone(), notifier.clone());

    let report = e.run_cycle().await;
    assert_eq!(
        report.outcome("negative surge"),
        Some(&RuleOutcome::Alerted {
            severity: Severity::High,
            delivered: true,
            logged: true
        })
    );

    let sent = notifier.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    let (recipients, alert) = &sent[0];
    assert_eq!(recipients, &vec!["ops@example.com".to_string(), "pr@example.com".to_string()]);
    assert_eq!(alert.severity, Severity::High);
    assert_eq!(alert.data["AI name"], "ChatGPT");
    assert_eq!(alert.data["Total responses"], 3);
    assert_eq!(alert.data["Negative responses"], 3);
    assert_eq!(alert.data["Negative ratio"], "100.0%");

    let keys: Vec<&str> = alert.data.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        ["AI name", "Total responses", "Negative responses", "Negative ratio", "Period"]
    );

    let log = store.alert_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].rule_name, "negative surge");
    assert_eq!(log[0].severity, Severity::High);
    assert_eq!(log[0].data, alert.data);
}

#[tokio::test]
async fn fifteen_mentions_trigger_medium_alert() {
    let store = Arc::new(MemoryStore::new());
    seed_mentions(&store, "Gemini", "Acme", 15);
    let notifier = Arc::new(RecordingNotifier::default());
    let r = rule("acme surge", ConditionType::MentionCount, 10.0, &["Acme"], &["Gemini"]);
    let e = engine(vec![r], store.clone(), notifier.clone());

    e.run_cycle().await;
    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::Medium);
    assert_eq!(alerts[0].data["Brand"], "Acme");
    assert_eq!(alerts[0].data["Mentions"], 15);
}

#[tokio::test]
async fn twenty_mentions_are_high_and_case_insensitive() {
    let store = Arc::new(MemoryStore::new());
    seed_mentions(&store, "Gemini", "acme", 20);
    let notifier = Arc::new(RecordingNotifier::default());
    let r = rule("acme surge", ConditionType::MentionCount, 10.0, &["Acme"], &["Gemini"]);
    let e = engine(vec![r], store, notifier.clone());

    e.run_cycle().await;
    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::High);
    // configured spelling wins
    assert_eq!(alerts[0].data["Brand"], "Acme");
}

#[tokio::test]
async fn keyword_detection_counts_all_matches_and_truncates_latest() {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    for i in 0..7 {
        store.seed_response("Claude", "Globex is a rival of Acme.", None, now - Duration::minutes(10 + i));
    }
    let long = format!("Newest: our competitor {}", "x".repeat(300));
    store.seed_response("Claude", &long, None, now - Duration::minutes(1));
    // outside the window
    store.seed_response("Claude", "competitor", None, now - Duration::hours(2));

    let notifier = Arc::new(RecordingNotifier::default());
    let r = rule("competitors", ConditionType::KeywordDetection, 8.0, &["competitor", "RIVAL"], &["Claude"]);
    let e = engine(vec![r], store, notifier.clone());
    e.run_cycle().await;

    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 1);
    let a = &alerts[0];
    assert_eq!(a.severity, Severity::Low);
    assert_eq!(a.data["Matches"], 8);
    assert_eq!(a.data["Keywords"], "competitor, RIVAL");
    let latest = a.data["Latest response"].as_str().unwrap();
    assert!(latest.starts_with("Newest: our competitor"));
    assert_eq!(latest.chars().count(), 203);
    assert!(latest.ends_with("..."));
}

#[tokio::test]
async fn keyword_detection_below_threshold_is_silent() {
    let store = Arc::new(MemoryStore::new());
    store.seed_response("Claude", "a rival appears", None, Utc::now());
    let notifier = Arc::new(RecordingNotifier::default());
    let r = rule("competitors", ConditionType::KeywordDetection, 2.0, &["rival"], &["Claude"]);
    engine(vec![r], store, notifier.clone()).run_cycle().await;
    assert!(notifier.alerts().is_empty());
}

#[tokio::test]
async fn inactive_rule_never_triggers() {
    let store = Arc::new(MemoryStore::new());
    seed_sentiments(&store, "ChatGPT", &[Sentiment::Negative; 5]);
    let notifier = Arc::new(RecordingNotifier::default());
    let mut r = sentiment_rule();
    r.active = false;
    let e = engine(vec![r], store.clone(), notifier.clone());

    let report = e.run_cycle().await;
    assert_eq!(report.outcome("negative surge"), Some(&RuleOutcome::Inactive));
    assert!(notifier.alerts().is_empty());
    assert!(store.alert_log().is_empty());
}

#[tokio::test]
async fn zero_responses_never_alert_even_at_zero_threshold() {
    let store = Arc::new(MemoryStore::new());
    // old responses only; nothing in the window
    store.seed_response("ChatGPT", "old", Some(Sentiment::Negative), Utc::now() - Duration::hours(3));
    let notifier = Arc::new(RecordingNotifier::default());
    let mut r = sentiment_rule();
    r.threshold = 0.0;
    engine(vec![r], store, notifier.clone()).run_cycle().await;
    assert!(notifier.alerts().is_empty());
}

#[tokio::test]
async fn first_qualifying_source_wins_in_configured_order() {
    let store = Arc::new(MemoryStore::new());
    seed_sentiments(&store, "Gemini", &[Sentiment::Negative; 2]);
    seed_sentiments(&store, "ChatGPT", &[Sentiment::Negative; 4]);
    let notifier = Arc::new(RecordingNotifier::default());
    let r = rule("neg", ConditionType::SentimentThreshold, 0.5, &[], &["ChatGPT", "Gemini"]);
    engine(vec![r], store, notifier.clone()).run_cycle().await;

    let alerts = notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].data["AI name"], "ChatGPT");
}

#[tokio::test]
async fn unreachable_store_skips_only_the_affected_rule() {
    let inner = MemoryStore::new();
    seed_mentions(&inner, "Gemini", "Acme", 12);
    seed_sentiments(&inner, "ChatGPT", &[Sentiment::Negative; 3]);
    let store = Arc::new(FlakyStore {
        inner,
        sentiment_down: true,
        log_down: false,
    });
    let notifier = Arc::new(RecordingNotifier::default());
    let rules = vec![
        sentiment_rule(),
        rule("acme surge", ConditionType::MentionCount, 10.0, &["Acme"], &["Gemini"]),
    ];
    let report = engine(rules, store.clone(), notifier.clone()).run_cycle().await;

    assert_eq!(report.outcome("negative surge"), Some(&RuleOutcome::EvaluationFailed));
    assert!(matches!(
        report.outcome("acme surge"),
        Some(RuleOutcome::Alerted { severity: Severity::Medium, .. })
    ));
    assert_eq!(report.evaluation_failures(), 1);
    assert_eq!(notifier.alerts().len(), 1);
    assert_eq!(store.inner.alert_log().len(), 1);
}

#[tokio::test]
async fn delivery_and_log_failures_do_not_stop_the_cycle() {
    let inner = MemoryStore::new();
    seed_sentiments(&inner, "ChatGPT", &[Sentiment::Negative; 3]);
    seed_mentions(&inner, "Gemini", "Acme", 25);
    let store = Arc::new(FlakyStore {
        inner,
        sentiment_down: false,
        log_down: true,
    });
    let notifier = Arc::new(RecordingNotifier::failing());
    let rules = vec![
        sentiment_rule(),
        rule("acme surge", ConditionType::MentionCount, 10.0, &["Acme"], &["Gemini"]),
    ];
    let report = engine(rules, store, notifier.clone()).run_cycle().await;

    assert_eq!(report.alerts_triggered(), 2);
    for name in ["negative surge", "acme surge"] {
        assert!(matches!(
            report.outcome(name),
            Some(RuleOutcome::Alerted {
                delivered: false,
                logged: false,
                ..
            })
        ));
    }
    // both attempted
    assert_eq!(notifier.alerts().len(), 2);
}

#[tokio::test]
async fn cycles_are_repeatable() {
    let store = Arc::new(MemoryStore::new());
    seed_sentiments(&store, "ChatGPT", &[Sentiment::Negative; 3]);
    let notifier = Arc::new(RecordingNotifier::default());
    let e = engine(vec![sentiment_rule()], store.clone(), notifier.clone());

    let a = e.run_cycle().await;
    let b = e.run_cycle().await;
    assert_eq!(a, b);
    assert_eq!(notifier.alerts().len(), 2);
    assert_eq!(store.alert_log().len(), 2);
}

#[tokio::test]
async fn evaluate_rule_surfaces_store_errors() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        sentiment_down: true,
        log_down: false,
    });
    let e = engine(vec![sentiment_rule()], store, Arc::new(RecordingNotifier::default()));
    let res = e.evaluate_rule(&sentiment_rule()).await;
    assert!(matches!(res, Err(StoreError::Unavailable { .. })));
}
