//! Session repository
//!
//! Database operations for login sessions and password reset tokens.
//!
//! This module provides:
//! - `SessionRepository` / `SqlxSessionRepository`
//! - `PasswordResetRepository` / `SqlxPasswordResetRepository`

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{PasswordReset, Session};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID (token)
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all sessions for a user
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Delete expired sessions, returning how many were removed
    async fn delete_expired(&self) -> Result<i64>;
}

pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        const SQL: &str =
            "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to create session")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .bind(session.created_at)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to create session")?;
            }
        }
        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        const SQL: &str = "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SQL)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get session by ID")?;
                Ok(row.map(|row| Session {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SQL)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get session by ID")?;
                Ok(row.map(|row| Session {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    created_at: row.get("created_at"),
                }))
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        const SQL: &str = "DELETE FROM sessions WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete session")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete session")?;
            }
        }
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        const SQL: &str = "DELETE FROM sessions WHERE user_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(user_id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete sessions by user")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(user_id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete sessions by user")?;
            }
        }
        Ok(())
    }

    async fn delete_expired(&self) -> Result<i64> {
        const SQL: &str = "DELETE FROM sessions WHERE expires_at < ?";
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
        };
        Ok(affected as i64)
    }
}

/// Password reset token storage
#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    async fn create(&self, reset: &PasswordReset) -> Result<()>;

    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<PasswordReset>>;

    /// Remove every pending reset for a user
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;
}

pub struct SqlxPasswordResetRepository {
    pool: DynDatabasePool,
}

impl SqlxPasswordResetRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PasswordResetRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PasswordResetRepository for SqlxPasswordResetRepository {
    async fn create(&self, reset: &PasswordReset) -> Result<()> {
        const SQL: &str =
            "INSERT INTO password_resets (token_hash, user_id, expires_at) VALUES (?, ?, ?)";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(&reset.token_hash)
                    .bind(reset.user_id)
                    .bind(reset.expires_at)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to create password reset")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(&reset.token_hash)
                    .bind(reset.user_id)
                    .bind(reset.expires_at)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to create password reset")?;
            }
        }
        Ok(())
    }

    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<PasswordReset>> {
        const SQL: &str =
            "SELECT token_hash, user_id, expires_at FROM password_resets WHERE token_hash = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(SQL)
                    .bind(token_hash)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get password reset")?;
                Ok(row.map(|row| PasswordReset {
                    token_hash: row.get("token_hash"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                }))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(SQL)
                    .bind(token_hash)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get password reset")?;
                Ok(row.map(|row| PasswordReset {
                    token_hash: row.get("token_hash"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                }))
            }
        }
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        const SQL: &str = "DELETE FROM password_resets WHERE user_id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(user_id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete password resets")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(user_id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to delete password resets")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;
    use uuid::Uuid;

    async fn setup_test_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    fn create_test_session(user_id: i64, expires_in_days: i64) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(expires_in_days),
            created_at: now,
        }
    }

    // Sessions reference users, so insert the owner first
    async fn create_test_user(pool: &DynDatabasePool, id: i64) {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(format!("user{}", id))
        .bind(format!("user{}@example.com", id))
        .bind("hash")
        .bind(now)
        .bind(now)
        .execute(pool.sqlite().unwrap())
        .await
        .expect("Failed to create test user");
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let pool = setup_test_pool().await;
        create_test_user(&pool, 1).await;
        let repo = SqlxSessionRepository::new(pool);

        let session = create_test_session(1, 7);
        repo.create(&session).await.expect("Failed to create session");

        let found = repo
            .get_by_id(&session.id)
            .await
            .expect("Failed to get session")
            .expect("Session not found");
        assert_eq!(found.user_id, 1);

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let pool = setup_test_pool().await;
        create_test_user(&pool, 1).await;
        let repo = SqlxSessionRepository::new(pool);

        let session = create_test_session(1, 7);
        repo.create(&session).await.unwrap();
        repo.delete(&session.id).await.unwrap();
        assert!(repo.get_by_id(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_sessions_by_user() {
        let pool = setup_test_pool().await;
        create_test_user(&pool, 1).await;
        create_test_user(&pool, 2).await;
        let repo = SqlxSessionRepository::new(pool);

        let session1 = create_test_session(1, 7);
        let session2 = create_test_session(1, 7);
        let session3 = create_test_session(2, 7);
        for s in [&session1, &session2, &session3] {
            repo.create(s).await.unwrap();
        }

        repo.delete_by_user(1).await.unwrap();

        assert!(repo.get_by_id(&session1.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&session2.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&session3.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let pool = setup_test_pool().await;
        create_test_user(&pool, 1).await;
        let repo = SqlxSessionRepository::new(pool);

        let now = Utc::now();
        let expired = Session {
            id: Uuid::new_v4().to_string(),
            user_id: 1,
            expires_at: now - Duration::days(1),
            created_at: now - Duration::days(8),
        };
        let valid = create_test_session(1, 7);
        repo.create(&expired).await.unwrap();
        repo.create(&valid).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.get_by_id(&expired.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&valid.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_password_reset_lifecycle() {
        let pool = setup_test_pool().await;
        create_test_user(&pool, 1).await;
        let repo = SqlxPasswordResetRepository::new(pool);

        let reset = PasswordReset {
            token_hash: "abc123".to_string(),
            user_id: 1,
            expires_at: Utc::now() + Duration::hours(1),
        };
        repo.create(&reset).await.unwrap();

        let found = repo.get_by_hash("abc123").await.unwrap().unwrap();
        assert_eq!(found.user_id, 1);
        assert!(!found.is_expired());

        repo.delete_by_user(1).await.unwrap();
        assert!(repo.get_by_hash("abc123").await.unwrap().is_none());
    }
}
