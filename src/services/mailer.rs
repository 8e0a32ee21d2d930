//! Outgoing mail
//!
//! `SmtpMailer` delivers through lettre's async SMTP transport. Without an
//! SMTP host the site falls back to `LogMailer`, which only logs and keeps
//! the most recent messages in memory.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::config::MailConfig;

const LOG_OUTBOX_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

pub type DynMailer = Arc<dyn Mailer>;

/// Build the mailer the configuration asks for
pub fn create_mailer(config: &MailConfig) -> Result<DynMailer> {
    if config.is_enabled() {
        let mailer = SmtpMailer::new(config)?;
        tracing::info!("Mail delivery via SMTP {}:{}", config.smtp_host, config.smtp_port);
        Ok(Arc::new(mailer))
    } else {
        tracing::info!("No SMTP host configured, outgoing mail will only be logged");
        Ok(Arc::new(LogMailer::new()))
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from)
            .parse()
            .map_err(|e| anyhow!("Invalid from address: {}", e))?;

        // 465 is implicit TLS, 587 is STARTTLS, anything else is plain (local relays)
        let builder = match config.smtp_port {
            465 => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?,
            587 => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?,
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host),
        };
        let builder = builder.port(config.smtp_port);
        let builder = if config.smtp_username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
        };

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let builder = Message::builder()
            .from(self.from.clone())
            .to(mail
                .to
                .parse()
                .map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(mail.subject.clone());

        let message = match &mail.html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                mail.text.clone(),
                html.clone(),
            )),
            None => builder.singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(mail.text.clone()),
            ),
        }
        .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(message)
            .await
            .context("Failed to send email")?;
        Ok(())
    }
}

/// Mailer that records instead of delivering
#[derive(Default)]
pub struct LogMailer {
    outbox: Mutex<VecDeque<OutgoingMail>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent messages, oldest first
    pub fn sent(&self) -> Vec<OutgoingMail> {
        match self.outbox.lock() {
            Ok(outbox) => outbox.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "Mail not delivered (no SMTP configured)");
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| anyhow!("Mail outbox lock poisoned"))?;
        if outbox.len() == LOG_OUTBOX_CAPACITY {
            outbox.pop_front();
        }
        outbox.push_back(mail.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(to: &str) -> OutgoingMail {
        OutgoingMail {
            to: to.to_string(),
            subject: "Hello".to_string(),
            text: "Body".to_string(),
            html: None,
        }
    }

    #[tokio::test]
    async fn test_log_mailer_records() {
        let mailer = LogMailer::new();
        mailer.send(&mail("a@example.com")).await.unwrap();
        mailer.send(&mail("b@example.com")).await.unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, "b@example.com");
    }

    #[tokio::test]
    async fn test_log_mailer_is_bounded() {
        let mailer = LogMailer::new();
        for i in 0..(LOG_OUTBOX_CAPACITY + 5) {
            mailer.send(&mail(&format!("u{}@example.com", i))).await.unwrap();
        }
        let sent = mailer.sent();
        assert_eq!(sent.len(), LOG_OUTBOX_CAPACITY);
        assert_eq!(sent[0].to, "u5@example.com");
    }

    #[test]
    fn test_create_mailer_without_host_logs() {
        assert!(create_mailer(&MailConfig::default()).is_ok());
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_from() {
        let config = MailConfig {
            smtp_host: "localhost".into(),
            from: "not an address".into(),
            ..Default::default()
        };
        assert!(SmtpMailer::new(&config).is_err());
    }
}
