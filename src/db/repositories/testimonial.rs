//! Testimonial repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Testimonial;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait TestimonialRepository: Send + Sync {
    /// Newest first
    async fn list(&self) -> Result<Vec<Testimonial>>;
    async fn create(&self, testimonial: &Testimonial) -> Result<Testimonial>;
    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxTestimonialRepository {
    pool: DynDatabasePool,
}

impl SqlxTestimonialRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TestimonialRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TestimonialRepository for SqlxTestimonialRepository {
    async fn list(&self) -> Result<Vec<Testimonial>> {
        const SQL: &str = "SELECT id, author, role, company, quote, avatar, created_at FROM testimonials ORDER BY created_at DESC, id DESC";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(SQL)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list testimonials")?;
                Ok(rows
                    .iter()
                    .map(|row| Testimonial {
                        id: row.get("id"),
                        author: row.get("author"),
                        role: row.get("role"),
                        company: row.get("company"),
                        quote: row.get("quote"),
                        avatar: row.get("avatar"),
                        created_at: row.get("created_at"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(SQL)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list testimonials")?;
                Ok(rows
                    .iter()
                    .map(|row| Testimonial {
                        id: row.get("id"),
                        author: row.get("author"),
                        role: row.get("role"),
                        company: row.get("company"),
                        quote: row.get("quote"),
                        avatar: row.get("avatar"),
                        created_at: row.get("created_at"),
                    })
                    .collect())
            }
        }
    }

    async fn create(&self, testimonial: &Testimonial) -> Result<Testimonial> {
        const SQL: &str = "INSERT INTO testimonials (author, role, company, quote, avatar, created_at) VALUES (?, ?, ?, ?, ?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(&testimonial.author)
                .bind(&testimonial.role)
                .bind(&testimonial.company)
                .bind(&testimonial.quote)
                .bind(&testimonial.avatar)
                .bind(testimonial.created_at)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create testimonial")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(&testimonial.author)
                .bind(&testimonial.role)
                .bind(&testimonial.company)
                .bind(&testimonial.quote)
                .bind(&testimonial.avatar)
                .bind(testimonial.created_at)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create testimonial")?
                .last_insert_id() as i64,
        };
        Ok(Testimonial {
            id,
            ..testimonial.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        const SQL: &str = "DELETE FROM testimonials WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete testimonial")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete testimonial")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}
