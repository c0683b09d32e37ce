//! Demo that seeds an in-memory store with a few monitoring scenarios,
//! runs the analysis pipeline and one alert cycle (log notifier only).

use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;

use ai_brand_monitor::analyze::Sentiment;
use ai_brand_monitor::notify::LogNotifier;
use ai_brand_monitor::store::{BrandMention, NewResponse};
use ai_brand_monitor::{
    AlertEngine, AlertRule, ConditionType, DataProcessor, EngineConfig, MemoryStore,
    ResponseStore, TextAnalyzer,
};

fn rule(name: &str, kind: ConditionType, threshold: f64, brands: &[&str], sources: &[&str]) -> AlertRule {
    AlertRule {
        name: name.into(),
        condition_type: kind,
        threshold,
        brand_keywords: brands.iter().map(|s| s.to_string()).collect(),
        ai_sources: sources.iter().map(|s| s.to_string()).collect(),
        recipients: vec!["ops@example.com".into()],
        active: true,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();

    // Three negative ChatGPT answers in the last hour.
    for i in 0..3 {
        store.seed_response(
            "ChatGPT",
            "Acme rockets are unreliable and the support is terrible.",
            Some(Sentiment::Negative),
            now - Duration::minutes(5 + i),
        );
    }

    // Fifteen Acme mentions from Gemini.
    for i in 0..15 {
        let id = store.seed_response(
            "Gemini",
            "Acme is a popular choice.",
            Some(Sentiment::Neutral),
            now - Duration::minutes(i),
        );
        store.seed_mention(BrandMention {
            ai_response_id: id,
            brand_name: "Acme".into(),
            mention_type: ai_brand_monitor::analyze::MentionType::Direct,
            sentiment: Sentiment::Neutral,
            context: "Acme is a popular choice.".into(),
        })?;
    }

    // Raw collector output, analysed by the pipeline below.
    store
        .insert_response(NewResponse::new(
            "Claude",
            "Which rocket vendor should I use?",
            "Contact us at http://acme.example for Acme support. A cheaper competitor is Globex.",
        ))
        .await?;

    let analyzer = Arc::new(TextAnalyzer::from_default_config());
    let processor = DataProcessor::new(analyzer, ["Acme", "Globex"], store.clone());
    let batch = processor.batch_process_unprocessed().await?;
    println!("analysed {} response(s), {} failed", batch.processed, batch.failed);

    let rules = vec![
        rule("Negative sentiment surge", ConditionType::SentimentThreshold, 0.7, &[], &["ChatGPT"]),
        rule("Acme mention surge", ConditionType::MentionCount, 10.0, &["Acme"], &["Gemini"]),
        rule("Competitor keyword detection", ConditionType::KeywordDetection, 1.0, &["competitor", "rival"], &["Claude"]),
    ];
    let engine = AlertEngine::new(rules, store.clone(), Arc::new(LogNotifier), EngineConfig::default())?;
    let report = engine.run_cycle().await;

    for r in &report.rules {
        println!("{:<32} {:?}", r.rule, r.outcome);
    }
    println!("alert log entries: {}", store.alert_log().len());
    println!("alert-demo done");
    Ok(())
}
