//! User service
//!
//! Back-office accounts and sessions:
//! - registration is open only while no account exists (first-run setup)
//! - login issues a server-side session whose id is the bearer token
//! - password resets use single-use tokens mailed to the account address;
//!   only their sha256 is stored

use crate::db::repositories::{PasswordResetRepository, SessionRepository, UserRepository};
use crate::models::{LoginInput, PasswordReset, RegisterInput, Session, User};
use crate::services::mailer::{DynMailer, OutgoingMail};
use crate::services::password::{hash_password, verify_decoy, verify_password};
use crate::services::validation::{validate_password, validate_registration, ValidationErrors};
use anyhow::Context;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

const RESET_TOKEN_MINUTES: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Registration is closed")]
    RegistrationClosed,

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Reset link is invalid or has expired")]
    InvalidResetToken,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    resets: Arc<dyn PasswordResetRepository>,
    mailer: DynMailer,
    session_days: i64,
    public_url: String,
    site_name: String,
}

/// sha256 of a reset token, hex encoded
pub fn hash_reset_token(token: &str) -> String {
    Sha256::digest(token.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        resets: Arc<dyn PasswordResetRepository>,
        mailer: DynMailer,
    ) -> Self {
        Self {
            users,
            sessions,
            resets,
            mailer,
            session_days: 7,
            public_url: "http://localhost:8080".to_string(),
            site_name: "DevStudio".to_string(),
        }
    }

    pub fn with_session_days(mut self, days: i64) -> Self {
        self.session_days = days.max(1);
        self
    }

    /// Site identity used in reset mails
    pub fn with_site(mut self, name: impl Into<String>, public_url: impl Into<String>) -> Self {
        self.site_name = name.into();
        self.public_url = public_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn session_days(&self) -> i64 {
        self.session_days
    }

    /// Whether the first administrator still has to be created
    pub async fn registration_open(&self) -> Result<bool, UserServiceError> {
        Ok(self.users.count().await.context("Failed to count users")? == 0)
    }

    pub async fn register(&self, input: &RegisterInput) -> Result<User, UserServiceError> {
        if !self.registration_open().await? {
            return Err(UserServiceError::RegistrationClosed);
        }
        validate_registration(&input.username, &input.email, &input.password)?;

        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();

        if self
            .users
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = self
            .users
            .create(&User::new(username, email, password_hash))
            .await
            .context("Failed to create user")?;
        tracing::info!("Administrator '{}' registered", user.username);
        Ok(user)
    }

    /// Check credentials (username or email) and open a session
    pub async fn login(&self, input: &LoginInput) -> Result<(Session, User), UserServiceError> {
        let identifier = input.username.trim();
        let invalid = || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let found = match self
            .users
            .get_by_username(identifier)
            .await
            .context("Failed to look up user")?
        {
            Some(user) => Some(user),
            None => self
                .users
                .get_by_email(identifier)
                .await
                .context("Failed to look up user")?,
        };
        let Some(user) = found else {
            verify_decoy(&input.password);
            return Err(invalid());
        };

        if !verify_password(&input.password, &user.password_hash).context("Failed to verify password")? {
            return Err(invalid());
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            expires_at: now + Duration::days(self.session_days),
            created_at: now,
        };
        let session = self
            .sessions
            .create(&session)
            .await
            .context("Failed to create session")?;
        tracing::info!("User '{}' logged in", user.username);
        Ok((session, user))
    }

    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.sessions
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// The user behind a live session; expired sessions are removed
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .sessions
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            self.sessions
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        Ok(self
            .users
            .get_by_id(session.user_id)
            .await
            .context("Failed to get session user")?)
    }

    /// Mail a reset link if the address belongs to an account.
    ///
    /// Succeeds either way so the response does not reveal which addresses
    /// are registered. Delivery failures are logged, not returned.
    pub async fn forgot_password(&self, email: &str) -> Result<(), UserServiceError> {
        let email = email.trim();
        let Some(user) = self
            .users
            .get_by_email(email)
            .await
            .context("Failed to look up user")?
        else {
            tracing::info!("Password reset requested for unknown address");
            return Ok(());
        };

        let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        self.resets
            .delete_by_user(user.id)
            .await
            .context("Failed to clear old reset tokens")?;
        self.resets
            .create(&PasswordReset {
                token_hash: hash_reset_token(&token),
                user_id: user.id,
                expires_at: Utc::now() + Duration::minutes(RESET_TOKEN_MINUTES),
            })
            .await
            .context("Failed to store reset token")?;

        let link = format!("{}/reset-password?token={}", self.public_url, token);
        let mail = OutgoingMail {
            to: user.email.clone(),
            subject: format!("[{}] Reset your password", self.site_name),
            text: format!(
                "Hi {},\n\nUse the link below to choose a new password. It expires in {} minutes.\n\n{}\n\nIf you did not ask for this, you can ignore this email.\n",
                user.username, RESET_TOKEN_MINUTES, link
            ),
            html: None,
        };
        if let Err(e) = self.mailer.send(&mail).await {
            tracing::warn!("Failed to send password reset mail: {:#}", e);
        }
        Ok(())
    }

    /// Consume a reset token and set a new password. All of the user's
    /// sessions are ended.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), UserServiceError> {
        validate_password(password)?;

        let reset = self
            .resets
            .get_by_hash(&hash_reset_token(token.trim()))
            .await
            .context("Failed to look up reset token")?
            .ok_or(UserServiceError::InvalidResetToken)?;

        if reset.is_expired() {
            self.resets
                .delete_by_user(reset.user_id)
                .await
                .context("Failed to delete expired reset token")?;
            return Err(UserServiceError::InvalidResetToken);
        }

        let password_hash = hash_password(password).context("Failed to hash password")?;
        self.users
            .update_password(reset.user_id, &password_hash)
            .await
            .context("Failed to update password")?;
        self.resets
            .delete_by_user(reset.user_id)
            .await
            .context("Failed to consume reset token")?;
        self.sessions
            .delete_by_user(reset.user_id)
            .await
            .context("Failed to end sessions")?;
        tracing::info!("Password reset for user {}", reset.user_id);
        Ok(())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.users.get_by_id(id).await.context("Failed to get user")?)
    }

    /// Remove expired sessions; run periodically
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        Ok(self
            .sessions
            .delete_expired()
            .await
            .context("Failed to clean up sessions")?)
    }
}
