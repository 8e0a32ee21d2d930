//! Newsletter service
//!
//! One row per address. Subscribing an unsubscribed address reactivates
//! it; subscribing an active one is a no-op. Broadcasts go to active
//! subscribers only, a few at a time, and stamp `last_email_sent` on each
//! delivered copy.

use crate::client::{ApiClient, ClientError};
use crate::db::repositories::SubscriberRepository;
use crate::models::{NewsletterInput, SendReport, Subscriber, SubscriberStatus};
use crate::services::mailer::{DynMailer, OutgoingMail};
use crate::services::markdown::MarkdownRenderer;
use crate::services::validation::{validate_subscriber_email, ValidationErrors};
use anyhow::Context;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Deliveries in flight at once during a broadcast
const SEND_CONCURRENCY: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum NewsletterError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Upstream error: {0}")]
    Upstream(#[from] ClientError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub enum SubscribeOutcome {
    Created(Subscriber),
    Reactivated(Subscriber),
    AlreadyActive(Subscriber),
    Forwarded,
}

impl SubscribeOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            SubscribeOutcome::Created(_) | SubscribeOutcome::Forwarded => {
                "Thanks for subscribing!"
            }
            SubscribeOutcome::Reactivated(_) => "Welcome back! Your subscription is active again.",
            SubscribeOutcome::AlreadyActive(_) => "You're already subscribed.",
        }
    }
}

pub struct NewsletterService {
    repo: Arc<dyn SubscriberRepository>,
    mailer: DynMailer,
    upstream: Option<ApiClient>,
    site_name: String,
    public_url: String,
    renderer: MarkdownRenderer,
}

impl NewsletterService {
    pub fn new(
        repo: Arc<dyn SubscriberRepository>,
        mailer: DynMailer,
        upstream: Option<ApiClient>,
        site_name: impl Into<String>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            mailer,
            upstream,
            site_name: site_name.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            renderer: MarkdownRenderer::new(),
        }
    }

    pub async fn subscribe(&self, email: &str) -> Result<SubscribeOutcome, NewsletterError> {
        let email = validate_subscriber_email(email)?;

        if let Some(client) = &self.upstream {
            client.subscribe(&email).await?;
            return Ok(SubscribeOutcome::Forwarded);
        }

        match self
            .repo
            .get_by_email(&email)
            .await
            .context("Failed to look up subscriber")?
        {
            Some(existing) if existing.status == SubscriberStatus::Active => {
                Ok(SubscribeOutcome::AlreadyActive(existing))
            }
            Some(existing) => {
                self.repo
                    .set_status(existing.id, SubscriberStatus::Active)
                    .await
                    .context("Failed to reactivate subscriber")?;
                tracing::info!("Subscriber {} reactivated", existing.id);
                Ok(SubscribeOutcome::Reactivated(Subscriber {
                    status: SubscriberStatus::Active,
                    ..existing
                }))
            }
            None => {
                let subscriber = Subscriber {
                    id: 0,
                    email,
                    status: SubscriberStatus::Active,
                    created_at: Utc::now(),
                    last_email_sent: None,
                };
                match self.repo.create(&subscriber).await {
                    Ok(created) => {
                        tracing::info!("New subscriber {}", created.id);
                        Ok(SubscribeOutcome::Created(created))
                    }
                    // A concurrent subscribe for the same address won the insert
                    Err(e) => match self
                        .repo
                        .get_by_email(&subscriber.email)
                        .await
                        .context("Failed to look up subscriber")?
                    {
                        Some(existing) => Ok(SubscribeOutcome::AlreadyActive(existing)),
                        None => Err(NewsletterError::Internal(e.context("Failed to create subscriber"))),
                    },
                }
            }
        }
    }

    /// Deactivate an address. Returns whether anything changed; unknown
    /// addresses are not an error.
    pub async fn unsubscribe(&self, email: &str) -> Result<bool, NewsletterError> {
        let email = validate_subscriber_email(email)?;

        if let Some(client) = &self.upstream {
            client.unsubscribe(&email).await?;
            return Ok(true);
        }

        match self
            .repo
            .get_by_email(&email)
            .await
            .context("Failed to look up subscriber")?
        {
            Some(existing) if existing.status == SubscriberStatus::Active => {
                self.repo
                    .set_status(existing.id, SubscriberStatus::Unsubscribed)
                    .await
                    .context("Failed to unsubscribe")?;
                tracing::info!("Subscriber {} unsubscribed", existing.id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn list(&self, status: Option<SubscriberStatus>) -> Result<Vec<Subscriber>, NewsletterError> {
        Ok(self
            .repo
            .list(status)
            .await
            .context("Failed to list subscribers")?)
    }

    pub async fn count(&self, status: Option<SubscriberStatus>) -> Result<i64, NewsletterError> {
        Ok(self
            .repo
            .count(status)
            .await
            .context("Failed to count subscribers")?)
    }

    /// Mail `input` to every active subscriber
    pub async fn send(&self, input: &NewsletterInput) -> Result<SendReport, NewsletterError> {
        let mut errors = ValidationErrors::new();
        if input.subject.trim().is_empty() {
            errors.add("subject", "Subject is required");
        }
        if input.content.trim().is_empty() {
            errors.add("content", "Content is required");
        }
        errors.into_result()?;

        let recipients = self
            .repo
            .list(Some(SubscriberStatus::Active))
            .await
            .context("Failed to list active subscribers")?;

        let subject = input.subject.trim().to_string();
        let body_html = self.renderer.render(&input.content);

        let results: Vec<bool> = stream::iter(recipients)
            .map(|subscriber| {
                let mail = self.compose(&subscriber, &subject, &input.content, &body_html);
                async move { self.deliver(&subscriber, &mail).await }
            })
            .buffer_unordered(SEND_CONCURRENCY)
            .collect()
            .await;

        let sent = results.iter().filter(|ok| **ok).count();
        let report = SendReport {
            sent,
            failed: results.len() - sent,
        };
        tracing::info!(
            "Newsletter \"{}\" sent to {} subscribers ({} failed)",
            subject,
            report.sent,
            report.failed
        );
        Ok(report)
    }

    fn unsubscribe_link(&self, email: &str) -> String {
        format!(
            "{}/unsubscribe?email={}",
            self.public_url,
            urlencoding::encode(email)
        )
    }

    fn compose(&self, subscriber: &Subscriber, subject: &str, markdown: &str, html: &str) -> OutgoingMail {
        let link = self.unsubscribe_link(&subscriber.email);
        OutgoingMail {
            to: subscriber.email.clone(),
            subject: subject.to_string(),
            text: format!(
                "{}\n\n--\nYou are receiving this because you subscribed to {} updates.\nUnsubscribe: {}\n",
                markdown.trim(),
                self.site_name,
                link
            ),
            html: Some(format!(
                "{}<hr><p style=\"font-size:12px;color:#666\">You are receiving this because you subscribed to {} updates. <a href=\"{}\">Unsubscribe</a></p>",
                html,
                crate::services::markdown::html_escape(&self.site_name),
                crate::services::markdown::html_escape(&link)
            )),
        }
    }

    async fn deliver(&self, subscriber: &Subscriber, mail: &OutgoingMail) -> bool {
        if let Err(e) = self.mailer.send(mail).await {
            tracing::warn!("Newsletter delivery to subscriber {} failed: {:#}", subscriber.id, e);
            return false;
        }
        if let Err(e) = self.repo.mark_sent(subscriber.id, Utc::now()).await {
            tracing::warn!("Delivered to subscriber {} but could not record it: {:#}", subscriber.id, e);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxSubscriberRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::services::mailer::{LogMailer, Mailer};
    use async_trait::async_trait;

    /// Fails for one address, records the rest
    struct FlakyMailer {
        inner: LogMailer,
        reject: String,
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, mail: &OutgoingMail) -> anyhow::Result<()> {
            if mail.to == self.reject {
                anyhow::bail!("mailbox unavailable");
            }
            self.inner.send(mail).await
        }
    }

    /// Misses the first lookup, like a subscribe that lost the race to
    /// another request for the same address
    struct RacingRepository {
        inner: Arc<dyn SubscriberRepository>,
        missed: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl SubscriberRepository for RacingRepository {
        async fn get_by_email(&self, email: &str) -> anyhow::Result<Option<Subscriber>> {
            if !self.missed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.get_by_email(email).await
        }
        async fn create(&self, subscriber: &Subscriber) -> anyhow::Result<Subscriber> {
            self.inner.create(subscriber).await
        }
        async fn set_status(&self, id: i64, status: SubscriberStatus) -> anyhow::Result<bool> {
            self.inner.set_status(id, status).await
        }
        async fn list(&self, status: Option<SubscriberStatus>) -> anyhow::Result<Vec<Subscriber>> {
            self.inner.list(status).await
        }
        async fn mark_sent(&self, id: i64, at: chrono::DateTime<Utc>) -> anyhow::Result<()> {
            self.inner.mark_sent(id, at).await
        }
        async fn count(&self, status: Option<SubscriberStatus>) -> anyhow::Result<i64> {
            self.inner.count(status).await
        }
    }

    async fn setup(mailer: DynMailer) -> NewsletterService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        NewsletterService::new(
            SqlxSubscriberRepository::boxed(pool),
            mailer,
            None,
            "DevStudio",
            "http://localhost:8080/",
        )
    }

    fn newsletter() -> NewsletterInput {
        NewsletterInput {
            subject: "March update".into(),
            content: "## News\n\nWe shipped **three** projects.".into(),
        }
    }

    #[tokio::test]
    async fn test_subscribe_twice_keeps_one_row() {
        let service = setup(Arc::new(LogMailer::new())).await;
        assert!(matches!(
            service.subscribe("Ana@Example.com").await.unwrap(),
            SubscribeOutcome::Created(_)
        ));
        assert!(matches!(
            service.subscribe(" ana@example.com ").await.unwrap(),
            SubscribeOutcome::AlreadyActive(_)
        ));
        assert_eq!(service.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_losing_insert_race_is_already_active() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let inner = SqlxSubscriberRepository::boxed(pool);
        let first = NewsletterService::new(inner.clone(), Arc::new(LogMailer::new()), None, "DevStudio", "");
        first.subscribe("ana@example.com").await.unwrap();

        let racing = Arc::new(RacingRepository {
            inner,
            missed: std::sync::atomic::AtomicBool::new(false),
        });
        let second = NewsletterService::new(racing, Arc::new(LogMailer::new()), None, "DevStudio", "");
        let outcome = second.subscribe("ana@example.com").await.unwrap();
        assert!(matches!(outcome, SubscribeOutcome::AlreadyActive(_)));
        assert_eq!(second.count(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resubscribe_reactivates() {
        let service = setup(Arc::new(LogMailer::new())).await;
        service.subscribe("ana@example.com").await.unwrap();
        assert!(service.unsubscribe("ana@example.com").await.unwrap());
        assert!(!service.unsubscribe("ana@example.com").await.unwrap());
        assert_eq!(service.count(Some(SubscriberStatus::Active)).await.unwrap(), 0);

        let outcome = service.subscribe("ana@example.com").await.unwrap();
        assert!(matches!(outcome, SubscribeOutcome::Reactivated(_)));
        assert_eq!(service.count(None).await.unwrap(), 1);
        assert_eq!(service.count(Some(SubscriberStatus::Active)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let service = setup(Arc::new(LogMailer::new())).await;
        assert!(matches!(
            service.subscribe("not-an-email").await,
            Err(NewsletterError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_send_reaches_only_active_subscribers() {
        let mailer = Arc::new(LogMailer::new());
        let service = setup(mailer.clone()).await;
        service.subscribe("a@example.com").await.unwrap();
        service.subscribe("b@example.com").await.unwrap();
        service.subscribe("gone@example.com").await.unwrap();
        service.unsubscribe("gone@example.com").await.unwrap();

        let report = service.send(&newsletter()).await.unwrap();
        assert_eq!(report, SendReport { sent: 2, failed: 0 });

        let mut recipients: Vec<String> = mailer.sent().into_iter().map(|m| m.to).collect();
        recipients.sort();
        assert_eq!(recipients, vec!["a@example.com", "b@example.com"]);

        let html = mailer.sent()[0].html.clone().unwrap();
        assert!(html.contains("<strong>three</strong>"));
        assert!(html.contains("http://localhost:8080/unsubscribe?email="));

        for s in service.list(None).await.unwrap() {
            assert_eq!(s.last_email_sent.is_some(), s.status == SubscriberStatus::Active);
        }
    }

    #[tokio::test]
    async fn test_failed_delivery_is_counted_and_not_stamped() {
        let mailer = Arc::new(FlakyMailer {
            inner: LogMailer::new(),
            reject: "bad@example.com".into(),
        });
        let service = setup(mailer).await;
        service.subscribe("good@example.com").await.unwrap();
        service.subscribe("bad@example.com").await.unwrap();

        let report = service.send(&newsletter()).await.unwrap();
        assert_eq!(report, SendReport { sent: 1, failed: 1 });

        for s in service.list(None).await.unwrap() {
            assert_eq!(s.last_email_sent.is_some(), s.email == "good@example.com");
        }
    }

    #[tokio::test]
    async fn test_send_requires_subject_and_content() {
        let service = setup(Arc::new(LogMailer::new())).await;
        let err = service.send(&NewsletterInput::default()).await.unwrap_err();
        let NewsletterError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert!(errors.get("subject").is_some());
        assert!(errors.get("content").is_some());
    }
}
