// src/notify/email.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, Message, MultiPart};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};
use tracing::{debug, info};

use super::{render, Notifier};
use crate::alerts::Alert;
use crate::config::SmtpSettings;

/// SMTP sink sending multipart/alternative (plain + HTML) mail.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    /// STARTTLS relay by default; `starttls = false` talks plain SMTP (local relays, test sinks).
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let mut builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .with_context(|| format!("invalid SMTP_HOST {}", settings.host))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
        };
        if let Some(port) = settings.port {
            builder = builder.port(port);
        }
        if let Some((user, pass)) = &settings.credentials {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let from: Mailbox = settings
            .from
            .parse()
            .with_context(|| format!("invalid SMTP_FROM {}", settings.from))?;

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }

    fn build_message(&self, recipients: &[String], alert: &Alert) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(render::subject(alert));
        for r in recipients {
            let to: Mailbox = r
                .parse()
                .with_context(|| format!("invalid recipient {r}"))?;
            builder = builder.to(to);
        }
        builder
            .multipart(MultiPart::alternative_plain_html(
                render::plain_text(alert),
                render::html(alert),
            ))
            .context("build email")
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, recipients: &[String], alert: &Alert) -> Result<()> {
        if recipients.is_empty() {
            debug!(target: "notify", rule = %alert.rule_name, "no recipients; email skipped");
            return Ok(());
        }
        let msg = self.build_message(recipients, alert)?;
        self.mailer.send(msg).await.context("send email")?;
        info!(
            target: "notify",
            rule = %alert.rule_name,
            recipients = recipients.len(),
            "alert email sent"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}
