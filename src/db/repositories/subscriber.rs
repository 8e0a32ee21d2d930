//! Newsletter subscriber repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Subscriber, SubscriberStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

const SUBSCRIBER_COLUMNS: &str = "id, email, status, created_at, last_email_sent";

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<Option<Subscriber>>;
    async fn create(&self, subscriber: &Subscriber) -> Result<Subscriber>;
    async fn set_status(&self, id: i64, status: SubscriberStatus) -> Result<bool>;
    /// Newest first, optionally narrowed to one status
    async fn list(&self, status: Option<SubscriberStatus>) -> Result<Vec<Subscriber>>;
    /// Record a delivered newsletter
    async fn mark_sent(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
    async fn count(&self, status: Option<SubscriberStatus>) -> Result<i64>;
}

pub struct SqlxSubscriberRepository {
    pool: DynDatabasePool,
}

impl SqlxSubscriberRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SubscriberRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SubscriberRepository for SqlxSubscriberRepository {
    async fn get_by_email(&self, email: &str) -> Result<Option<Subscriber>> {
        let sql = format!("SELECT {} FROM subscribers WHERE email = ?", SUBSCRIBER_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get subscriber by email")?;
                row.as_ref().map(row_to_subscriber_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(email)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get subscriber by email")?;
                row.as_ref().map(row_to_subscriber_mysql).transpose()
            }
        }
    }

    async fn create(&self, subscriber: &Subscriber) -> Result<Subscriber> {
        const SQL: &str = "INSERT INTO subscribers (email, status, created_at, last_email_sent) VALUES (?, ?, ?, ?)";
        let status = subscriber.status.to_string();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(&subscriber.email)
                .bind(&status)
                .bind(subscriber.created_at)
                .bind(subscriber.last_email_sent)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create subscriber")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(&subscriber.email)
                .bind(&status)
                .bind(subscriber.created_at)
                .bind(subscriber.last_email_sent)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create subscriber")?
                .last_insert_id() as i64,
        };
        Ok(Subscriber {
            id,
            ..subscriber.clone()
        })
    }

    async fn set_status(&self, id: i64, status: SubscriberStatus) -> Result<bool> {
        const SQL: &str = "UPDATE subscribers SET status = ? WHERE id = ?";
        let status = status.to_string();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(&status)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update subscriber status")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(&status)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update subscriber status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, status: Option<SubscriberStatus>) -> Result<Vec<Subscriber>> {
        let sql = match status {
            Some(_) => format!(
                "SELECT {} FROM subscribers WHERE status = ? ORDER BY created_at DESC, id DESC",
                SUBSCRIBER_COLUMNS
            ),
            None => format!(
                "SELECT {} FROM subscribers ORDER BY created_at DESC, id DESC",
                SUBSCRIBER_COLUMNS
            ),
        };
        let status = status.map(|s| s.to_string());
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list subscribers")?;
                rows.iter().map(row_to_subscriber_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list subscribers")?;
                rows.iter().map(row_to_subscriber_mysql).collect()
            }
        }
    }

    async fn mark_sent(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        const SQL: &str = "UPDATE subscribers SET last_email_sent = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(SQL)
                    .bind(at)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to stamp last_email_sent")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(SQL)
                    .bind(at)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to stamp last_email_sent")?;
            }
        }
        Ok(())
    }

    async fn count(&self, status: Option<SubscriberStatus>) -> Result<i64> {
        let sql = if status.is_some() {
            "SELECT COUNT(*) as count FROM subscribers WHERE status = ?"
        } else {
            "SELECT COUNT(*) as count FROM subscribers"
        };
        let status = status.map(|s| s.to_string());
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                query
                    .fetch_one(self.pool.sqlite()?)
                    .await
                    .context("Failed to count subscribers")?
                    .get("count")
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                query
                    .fetch_one(self.pool.mysql()?)
                    .await
                    .context("Failed to count subscribers")?
                    .get("count")
            }
        };
        Ok(count)
    }
}

fn parse_status(raw: &str) -> Result<SubscriberStatus> {
    SubscriberStatus::from_str(raw).map_err(|e| anyhow::anyhow!(e))
}

fn row_to_subscriber_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Subscriber> {
    let status: String = row.get("status");
    Ok(Subscriber {
        id: row.get("id"),
        email: row.get("email"),
        status: parse_status(&status)?,
        created_at: row.get("created_at"),
        last_email_sent: row.get("last_email_sent"),
    })
}

fn row_to_subscriber_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Subscriber> {
    let status: String = row.get("status");
    Ok(Subscriber {
        id: row.get("id"),
        email: row.get("email"),
        status: parse_status(&status)?,
        created_at: row.get("created_at"),
        last_email_sent: row.get("last_email_sent"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxSubscriberRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxSubscriberRepository::new(pool)
    }

    fn sample(email: &str) -> Subscriber {
        Subscriber {
            id: 0,
            email: email.to_string(),
            status: SubscriberStatus::Active,
            created_at: Utc::now(),
            last_email_sent: None,
        }
    }

    #[tokio::test]
    async fn test_email_is_unique() {
        let repo = setup_test_repo().await;
        repo.create(&sample("a@example.com")).await.unwrap();
        assert!(repo.create(&sample("a@example.com")).await.is_err());
    }

    #[tokio::test]
    async fn test_status_and_mark_sent() {
        let repo = setup_test_repo().await;
        let a = repo.create(&sample("a@example.com")).await.unwrap();
        repo.create(&sample("b@example.com")).await.unwrap();

        assert!(repo.set_status(a.id, SubscriberStatus::Unsubscribed).await.unwrap());
        assert_eq!(repo.count(Some(SubscriberStatus::Active)).await.unwrap(), 1);
        assert_eq!(repo.count(None).await.unwrap(), 2);

        let active = repo.list(Some(SubscriberStatus::Active)).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].email, "b@example.com");

        let now = Utc::now();
        repo.mark_sent(active[0].id, now).await.unwrap();
        let found = repo.get_by_email("b@example.com").await.unwrap().unwrap();
        assert!(found.last_email_sent.is_some());
    }
}
