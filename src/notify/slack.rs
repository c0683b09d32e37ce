// src/notify/slack.rs
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::{render, Notifier};
use crate::alerts::Alert;

/// Incoming-webhook sink. Recipients are ignored; the webhook decides the channel.
pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn from_env() -> Option<Self> {
        std::env::var("SLACK_WEBHOOK_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .map(Self::new)
    }

    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn payload(alert: &Alert) -> serde_json::Value {
        let mut text = format!(
            "*{}*\n{}\n",
            render::subject(alert),
            alert.message
        );
        for (k, v) in &alert.data {
            text.push_str(&format!("• {}: {}\n", k, render::display_value(v)));
        }
        serde_json::json!({
            "text": text,
            "attachments": [{ "color": alert.severity.color(), "ts": alert.timestamp.timestamp() }],
        })
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, _recipients: &[String], alert: &Alert) -> Result<()> {
        self.client
            .post(&self.webhook_url)
            .timeout(self.timeout)
            .json(&Self::payload(alert))
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        tracing::debug!(target: "notify", rule = %alert.rule_name, "slack alert posted");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
