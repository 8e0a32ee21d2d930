//! Contact form service
//!
//! Submissions are validated here in both modes. In local mode they are
//! stored for the back-office; with an upstream configured they are
//! forwarded and nothing is kept.

use crate::client::{ApiClient, ClientError};
use crate::db::repositories::ContactRepository;
use crate::models::{ContactInput, ContactStatus, ContactSubmission};
use crate::services::validation::{validate_contact, ValidationErrors};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ContactServiceError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Submission not found")]
    NotFound,

    #[error("Upstream error: {0}")]
    Upstream(#[from] ClientError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// What happened to an accepted submission
#[derive(Debug, Clone)]
pub enum ContactOutcome {
    Stored(ContactSubmission),
    Forwarded,
}

pub struct ContactService {
    repo: Arc<dyn ContactRepository>,
    upstream: Option<ApiClient>,
}

impl ContactService {
    pub fn new(repo: Arc<dyn ContactRepository>, upstream: Option<ApiClient>) -> Self {
        Self { repo, upstream }
    }

    pub async fn submit(&self, input: &ContactInput) -> Result<ContactOutcome, ContactServiceError> {
        let input = validate_contact(input)?;

        if let Some(client) = &self.upstream {
            client.submit_contact(&input).await.map_err(|e| {
                tracing::error!("Forwarding contact submission failed: {}", e);
                e
            })?;
            tracing::info!("Contact submission forwarded to {}", client.base_url());
            return Ok(ContactOutcome::Forwarded);
        }

        let submission = ContactSubmission {
            id: 0,
            name: input.name,
            email: input.email,
            subject: input.subject,
            message: input.message,
            status: ContactStatus::New,
            created_at: Utc::now(),
        };
        let created = self
            .repo
            .create(&submission)
            .await
            .context("Failed to store contact submission")?;
        tracing::info!("Contact submission {} received", created.id);
        Ok(ContactOutcome::Stored(created))
    }

    pub async fn list(&self, status: Option<ContactStatus>) -> Result<Vec<ContactSubmission>, ContactServiceError> {
        Ok(self
            .repo
            .list(status)
            .await
            .context("Failed to list contact submissions")?)
    }

    pub async fn get(&self, id: i64) -> Result<ContactSubmission, ContactServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get contact submission")?
            .ok_or(ContactServiceError::NotFound)
    }

    /// Change one submission's status and return it
    pub async fn update_status(&self, id: i64, status: ContactStatus) -> Result<ContactSubmission, ContactServiceError> {
        if !self
            .repo
            .update_status(id, status)
            .await
            .context("Failed to update contact status")?
        {
            return Err(ContactServiceError::NotFound);
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ContactServiceError> {
        if !self
            .repo
            .delete(id)
            .await
            .context("Failed to delete contact submission")?
        {
            return Err(ContactServiceError::NotFound);
        }
        Ok(())
    }

    pub async fn count(&self, status: Option<ContactStatus>) -> Result<i64, ContactServiceError> {
        Ok(self
            .repo
            .count(status)
            .await
            .context("Failed to count contact submissions")?)
    }
}
