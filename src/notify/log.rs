// src/notify/log.rs
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::{render, Notifier};
use crate::alerts::Alert;

/// Writes the alert to the tracing log only. Used when no transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipients: &[String], alert: &Alert) -> Result<()> {
        info!(
            target: "notify",
            subject = %render::subject(alert),
            message = %alert.message,
            data = %serde_json::Value::Object(alert.data.clone()),
            recipients = ?recipients,
            "alert"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
