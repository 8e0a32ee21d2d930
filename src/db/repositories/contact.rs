//! Contact submission repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ContactStatus, ContactSubmission};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

const CONTACT_COLUMNS: &str = "id, name, email, subject, message, status, created_at";

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn create(&self, submission: &ContactSubmission) -> Result<ContactSubmission>;

    /// Newest first, optionally narrowed to one status
    async fn list(&self, status: Option<ContactStatus>) -> Result<Vec<ContactSubmission>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ContactSubmission>>;

    /// Set the status of a single submission. Returns false when the id is unknown.
    async fn update_status(&self, id: i64, status: ContactStatus) -> Result<bool>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count(&self, status: Option<ContactStatus>) -> Result<i64>;
}

pub struct SqlxContactRepository {
    pool: DynDatabasePool,
}

impl SqlxContactRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContactRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ContactRepository for SqlxContactRepository {
    async fn create(&self, submission: &ContactSubmission) -> Result<ContactSubmission> {
        const SQL: &str = "INSERT INTO contact_submissions (name, email, subject, message, status, created_at) VALUES (?, ?, ?, ?, ?, ?)";
        let status = submission.status.to_string();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(&submission.name)
                .bind(&submission.email)
                .bind(&submission.subject)
                .bind(&submission.message)
                .bind(&status)
                .bind(submission.created_at)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create contact submission")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(&submission.name)
                .bind(&submission.email)
                .bind(&submission.subject)
                .bind(&submission.message)
                .bind(&status)
                .bind(submission.created_at)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create contact submission")?
                .last_insert_id() as i64,
        };
        Ok(ContactSubmission {
            id,
            ..submission.clone()
        })
    }

    async fn list(&self, status: Option<ContactStatus>) -> Result<Vec<ContactSubmission>> {
        let sql = match status {
            Some(_) => format!(
                "SELECT {} FROM contact_submissions WHERE status = ? ORDER BY created_at DESC, id DESC",
                CONTACT_COLUMNS
            ),
            None => format!(
                "SELECT {} FROM contact_submissions ORDER BY created_at DESC, id DESC",
                CONTACT_COLUMNS
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
                    .context("Failed to list contact submissions")?;
                rows.iter().map(row_to_contact_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                if let Some(status) = &status {
                    query = query.bind(status);
                }
                let rows = query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list contact submissions")?;
                rows.iter().map(row_to_contact_mysql).collect()
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ContactSubmission>> {
        let sql = format!("SELECT {} FROM contact_submissions WHERE id = ?", CONTACT_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get contact submission")?;
                row.as_ref().map(row_to_contact_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get contact submission")?;
                row.as_ref().map(row_to_contact_mysql).transpose()
            }
        }
    }

    async fn update_status(&self, id: i64, status: ContactStatus) -> Result<bool> {
        const SQL: &str = "UPDATE contact_submissions SET status = ? WHERE id = ?";
        let status = status.to_string();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(&status)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update contact status")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(&status)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update contact status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        const SQL: &str = "DELETE FROM contact_submissions WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete contact submission")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete contact submission")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count(&self, status: Option<ContactStatus>) -> Result<i64> {
        let sql = if status.is_some() {
            "SELECT COUNT(*) as count FROM contact_submissions WHERE status = ?"
        } else {
            "SELECT COUNT(*) as count FROM contact_submissions"
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
                    .context("Failed to count contact submissions")?
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
                    .context("Failed to count contact submissions")?
                    .get("count")
            }
        };
        Ok(count)
    }
}

fn parse_status(raw: &str) -> Result<ContactStatus> {
    ContactStatus::from_str(raw).map_err(|e| anyhow::anyhow!(e))
}

fn row_to_contact_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<ContactSubmission> {
    let status: String = row.get("status");
    Ok(ContactSubmission {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        subject: row.get("subject"),
        message: row.get("message"),
        status: parse_status(&status)?,
        created_at: row.get("created_at"),
    })
}

fn row_to_contact_mysql(row: &sqlx::mysql::MySqlRow) -> Result<ContactSubmission> {
    let status: String = row.get("status");
    Ok(ContactSubmission {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        subject: row.get("subject"),
        message: row.get("message"),
        status: parse_status(&status)?,
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Utc;

    async fn setup_test_repo() -> SqlxContactRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxContactRepository::new(pool)
    }

    fn sample(name: &str) -> ContactSubmission {
        ContactSubmission {
            id: 0,
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            subject: "Project inquiry".to_string(),
            message: "We would like a quote.".to_string(),
            status: ContactStatus::New,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_archiving_one_submission_leaves_others() {
        let repo = setup_test_repo().await;
        let a = repo.create(&sample("Alice")).await.unwrap();
        let b = repo.create(&sample("Bob")).await.unwrap();
        let c = repo.create(&sample("Carol")).await.unwrap();

        assert!(repo.update_status(b.id, ContactStatus::Archived).await.unwrap());

        for (id, expected) in [
            (a.id, ContactStatus::New),
            (b.id, ContactStatus::Archived),
            (c.id, ContactStatus::New),
        ] {
            let row = repo.get_by_id(id).await.unwrap().unwrap();
            assert_eq!(row.status, expected);
        }
    }

    #[tokio::test]
    async fn test_list_and_count_by_status() {
        let repo = setup_test_repo().await;
        let a = repo.create(&sample("Alice")).await.unwrap();
        repo.create(&sample("Bob")).await.unwrap();
        repo.update_status(a.id, ContactStatus::Read).await.unwrap();

        assert_eq!(repo.list(None).await.unwrap().len(), 2);
        let read = repo.list(Some(ContactStatus::Read)).await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].name, "Alice");

        assert_eq!(repo.count(None).await.unwrap(), 2);
        assert_eq!(repo.count(Some(ContactStatus::New)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let repo = setup_test_repo().await;
        assert!(!repo.update_status(42, ContactStatus::Read).await.unwrap());
        assert!(!repo.delete(42).await.unwrap());
        assert!(repo.get_by_id(42).await.unwrap().is_none());
    }
}
