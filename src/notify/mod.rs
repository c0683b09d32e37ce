// src/notify/mod.rs
//! Alert delivery sinks.
//!
//! A `Notifier` either delivers or returns an error; the engine logs the error
//! and moves on to the next rule. `NotifierMux` fans one alert out to every
//! configured channel and only fails after all channels were attempted.

pub mod email;
pub mod log;
pub mod render;
pub mod slack;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::alerts::Alert;
use crate::config::SmtpSettings;

pub use email::EmailNotifier;
pub use log::LogNotifier;
pub use slack::SlackNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipients: &[String], alert: &Alert) -> Result<()>;

    fn name(&self) -> &'static str;
}

#[derive(Clone, Default)]
pub struct NotifierMux {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Email when SMTP_HOST is set, Slack when SLACK_WEBHOOK_URL is set,
    /// the log sink when neither is.
    pub fn from_env() -> Result<Self> {
        let mut mux = Self::new();
        if let Some(smtp) = SmtpSettings::from_env()? {
            mux = mux.with(Arc::new(EmailNotifier::new(&smtp)?));
        }
        if let Some(slack) = SlackNotifier::from_env() {
            mux = mux.with(Arc::new(slack));
        }
        if mux.is_empty() {
            mux = mux.with(Arc::new(LogNotifier));
        }
        let names: Vec<&str> = mux.sinks.iter().map(|s| s.name()).collect();
        info!(target: "notify", sinks = ?names, "notifiers configured");
        Ok(mux)
    }
}

#[async_trait]
impl Notifier for NotifierMux {
    async fn send(&self, recipients: &[String], alert: &Alert) -> Result<()> {
        let mut failed: Vec<&'static str> = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.send(recipients, alert).await {
                warn!(
                    target: "notify",
                    sink = sink.name(),
                    rule = %alert.rule_name,
                    error = %e,
                    "notification failed"
                );
                failed.push(sink.name());
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("notification failed on: {}", failed.join(", ")))
        }
    }

    fn name(&self) -> &'static str {
        "mux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertData, Severity};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize, bool);

    #[async_trait]
    impl Notifier for Counting {
        async fn send(&self, _r: &[String], _a: &Alert) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            if self.1 {
                Err(anyhow!("boom"))
            } else {
                Ok(())
            }
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn alert() -> Alert {
        Alert {
            rule_name: "r".into(),
            message: "m".into(),
            severity: Severity::Low,
            timestamp: Utc::now(),
            data: AlertData::new(),
        }
    }

    #[tokio::test]
    async fn mux_attempts_every_sink_and_reports_failure() {
        let bad = Arc::new(Counting(AtomicUsize::new(0), true));
        let good = Arc::new(Counting(AtomicUsize::new(0), false));
        let mux = NotifierMux::new().with(bad.clone()).with(good.clone());

        assert!(mux.send(&[], &alert()).await.is_err());
        assert_eq!(bad.0.load(Ordering::SeqCst), 1);
        assert_eq!(good.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_mux_is_ok() {
        assert!(NotifierMux::new().send(&[], &alert()).await.is_ok());
    }
}
