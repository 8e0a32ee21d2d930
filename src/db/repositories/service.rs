//! Service offering repository

use super::{decode_list, encode_list};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Service;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const SERVICE_COLUMNS: &str =
    "id, title, description, icon, features, price, sort_order, created_at, updated_at";

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    /// All services by `sort_order`, then id
    async fn list(&self) -> Result<Vec<Service>>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Service>>;
    async fn create(&self, service: &Service) -> Result<Service>;
    async fn update(&self, service: &Service) -> Result<bool>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn count(&self) -> Result<i64>;
}

pub struct SqlxServiceRepository {
    pool: DynDatabasePool,
}

impl SqlxServiceRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ServiceRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ServiceRepository for SqlxServiceRepository {
    async fn list(&self) -> Result<Vec<Service>> {
        let sql = format!(
            "SELECT {} FROM services ORDER BY sort_order ASC, id ASC",
            SERVICE_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list services")?;
                Ok(rows.iter().map(row_to_service_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list services")?;
                Ok(rows.iter().map(row_to_service_mysql).collect())
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Service>> {
        let sql = format!("SELECT {} FROM services WHERE id = ?", SERVICE_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get service by ID")?;
                Ok(row.as_ref().map(row_to_service_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get service by ID")?;
                Ok(row.as_ref().map(row_to_service_mysql))
            }
        }
    }

    async fn create(&self, service: &Service) -> Result<Service> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_service_sqlite(self.pool.sqlite()?, service).await,
            DatabaseDriver::Mysql => create_service_mysql(self.pool.mysql()?, service).await,
        }
    }

    async fn update(&self, service: &Service) -> Result<bool> {
        const SQL: &str = r#"
            UPDATE services
            SET title = ?, description = ?, icon = ?, features = ?, price = ?, sort_order = ?, updated_at = ?
            WHERE id = ?
        "#;
        let features = encode_list(&service.features)?;
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(&service.title)
                .bind(&service.description)
                .bind(&service.icon)
                .bind(&features)
                .bind(&service.price)
                .bind(service.sort_order)
                .bind(service.updated_at)
                .bind(service.id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update service")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(&service.title)
                .bind(&service.description)
                .bind(&service.icon)
                .bind(&features)
                .bind(&service.price)
                .bind(service.sort_order)
                .bind(service.updated_at)
                .bind(service.id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update service")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        const SQL: &str = "DELETE FROM services WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete service")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete service")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        const SQL: &str = "SELECT COUNT(*) as count FROM services";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count services")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count services")?
                .get("count"),
        };
        Ok(count)
    }
}

async fn create_service_sqlite(pool: &SqlitePool, service: &Service) -> Result<Service> {
    let result = sqlx::query(
        r#"
        INSERT INTO services (title, description, icon, features, price, sort_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&service.title)
    .bind(&service.description)
    .bind(&service.icon)
    .bind(encode_list(&service.features)?)
    .bind(&service.price)
    .bind(service.sort_order)
    .bind(service.created_at)
    .bind(service.updated_at)
    .execute(pool)
    .await
    .context("Failed to create service")?;

    Ok(Service {
        id: result.last_insert_rowid(),
        ..service.clone()
    })
}

fn row_to_service_sqlite(row: &sqlx::sqlite::SqliteRow) -> Service {
    Service {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        icon: row.get("icon"),
        features: decode_list(row.get("features")),
        price: row.get("price"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

async fn create_service_mysql(pool: &MySqlPool, service: &Service) -> Result<Service> {
    let result = sqlx::query(
        r#"
        INSERT INTO services (title, description, icon, features, price, sort_order, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&service.title)
    .bind(&service.description)
    .bind(&service.icon)
    .bind(encode_list(&service.features)?)
    .bind(&service.price)
    .bind(service.sort_order)
    .bind(service.created_at)
    .bind(service.updated_at)
    .execute(pool)
    .await
    .context("Failed to create service")?;

    Ok(Service {
        id: result.last_insert_id() as i64,
        ..service.clone()
    })
}

fn row_to_service_mysql(row: &sqlx::mysql::MySqlRow) -> Service {
    Service {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        icon: row.get("icon"),
        features: decode_list(row.get("features")),
        price: row.get("price"),
        sort_order: row.get("sort_order"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Utc;

    async fn setup_test_repo() -> SqlxServiceRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxServiceRepository::new(pool)
    }

    fn sample(title: &str, sort_order: i32) -> Service {
        let now = Utc::now();
        Service {
            id: 0,
            title: title.to_string(),
            description: "We build things".to_string(),
            icon: "code".to_string(),
            features: vec!["Fast".to_string()],
            price: Some("From $5k".to_string()),
            sort_order,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_list_respects_sort_order() {
        let repo = setup_test_repo().await;
        repo.create(&sample("Mobile", 2)).await.unwrap();
        repo.create(&sample("Web", 1)).await.unwrap();

        let services = repo.list().await.unwrap();
        assert_eq!(services[0].title, "Web");
        assert_eq!(services[1].title, "Mobile");
        assert_eq!(services[0].features, vec!["Fast"]);
    }

    #[tokio::test]
    async fn test_update_and_delete_service() {
        let repo = setup_test_repo().await;
        let mut service = repo.create(&sample("Web", 1)).await.unwrap();
        service.price = None;
        assert!(repo.update(&service).await.unwrap());

        let found = repo.get_by_id(service.id).await.unwrap().unwrap();
        assert!(found.price.is_none());

        assert!(repo.delete(service.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
