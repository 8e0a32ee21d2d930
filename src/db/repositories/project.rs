//! Project repository
//!
//! Portfolio projects. List-valued fields are stored as JSON text.

use super::{decode_list, encode_list};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Project, ProjectLinks};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const PROJECT_COLUMNS: &str = "id, title, category, description, technologies, image, featured, date, gallery, tags, live_url, repo_url, created_at, updated_at";

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// All projects, newest delivery date first
    async fn list(&self) -> Result<Vec<Project>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Project>>;

    /// Insert a project; the returned copy carries the new id
    async fn create(&self, project: &Project) -> Result<Project>;

    /// Overwrite a project by id. Returns false when no row matched.
    async fn update(&self, project: &Project) -> Result<bool>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxProjectRepository {
    pool: DynDatabasePool,
}

impl SqlxProjectRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ProjectRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ProjectRepository for SqlxProjectRepository {
    async fn list(&self) -> Result<Vec<Project>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_projects_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_projects_mysql(self.pool.mysql()?).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Project>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_project_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_project_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn create(&self, project: &Project) -> Result<Project> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_project_sqlite(self.pool.sqlite()?, project).await,
            DatabaseDriver::Mysql => create_project_mysql(self.pool.mysql()?, project).await,
        }
    }

    async fn update(&self, project: &Project) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_project_sqlite(self.pool.sqlite()?, project).await,
            DatabaseDriver::Mysql => update_project_mysql(self.pool.mysql()?, project).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        const SQL: &str = "DELETE FROM projects WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete project")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete project")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        const SQL: &str = "SELECT COUNT(*) as count FROM projects";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count projects")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count projects")?
                .get("count"),
        };
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn list_projects_sqlite(pool: &SqlitePool) -> Result<Vec<Project>> {
    let sql = format!(
        "SELECT {} FROM projects ORDER BY date DESC, id DESC",
        PROJECT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list projects")?;
    Ok(rows.iter().map(row_to_project_sqlite).collect())
}

async fn get_project_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Project>> {
    let sql = format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get project by ID")?;
    Ok(row.as_ref().map(row_to_project_sqlite))
}

async fn create_project_sqlite(pool: &SqlitePool, project: &Project) -> Result<Project> {
    let result = sqlx::query(
        r#"
        INSERT INTO projects (title, category, description, technologies, image, featured, date,
                              gallery, tags, live_url, repo_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&project.title)
    .bind(&project.category)
    .bind(&project.description)
    .bind(encode_list(&project.technologies)?)
    .bind(&project.image)
    .bind(project.featured)
    .bind(project.date)
    .bind(encode_list(&project.gallery)?)
    .bind(encode_list(&project.tags)?)
    .bind(&project.links.live)
    .bind(&project.links.repository)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(pool)
    .await
    .context("Failed to create project")?;

    Ok(Project {
        id: result.last_insert_rowid(),
        ..project.clone()
    })
}

async fn update_project_sqlite(pool: &SqlitePool, project: &Project) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE projects
        SET title = ?, category = ?, description = ?, technologies = ?, image = ?, featured = ?,
            date = ?, gallery = ?, tags = ?, live_url = ?, repo_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&project.title)
    .bind(&project.category)
    .bind(&project.description)
    .bind(encode_list(&project.technologies)?)
    .bind(&project.image)
    .bind(project.featured)
    .bind(project.date)
    .bind(encode_list(&project.gallery)?)
    .bind(encode_list(&project.tags)?)
    .bind(&project.links.live)
    .bind(&project.links.repository)
    .bind(project.updated_at)
    .bind(project.id)
    .execute(pool)
    .await
    .context("Failed to update project")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_project_sqlite(row: &sqlx::sqlite::SqliteRow) -> Project {
    Project {
        id: row.get("id"),
        title: row.get("title"),
        category: row.get("category"),
        description: row.get("description"),
        technologies: decode_list(row.get("technologies")),
        image: row.get("image"),
        featured: row.get("featured"),
        date: row.get("date"),
        gallery: decode_list(row.get("gallery")),
        tags: decode_list(row.get("tags")),
        links: ProjectLinks {
            live: row.get("live_url"),
            repository: row.get("repo_url"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn list_projects_mysql(pool: &MySqlPool) -> Result<Vec<Project>> {
    let sql = format!(
        "SELECT {} FROM projects ORDER BY date DESC, id DESC",
        PROJECT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .context("Failed to list projects")?;
    Ok(rows.iter().map(row_to_project_mysql).collect())
}

async fn get_project_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Project>> {
    let sql = format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get project by ID")?;
    Ok(row.as_ref().map(row_to_project_mysql))
}

async fn create_project_mysql(pool: &MySqlPool, project: &Project) -> Result<Project> {
    let result = sqlx::query(
        r#"
        INSERT INTO projects (title, category, description, technologies, image, featured, date,
                              gallery, tags, live_url, repo_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&project.title)
    .bind(&project.category)
    .bind(&project.description)
    .bind(encode_list(&project.technologies)?)
    .bind(&project.image)
    .bind(project.featured)
    .bind(project.date)
    .bind(encode_list(&project.gallery)?)
    .bind(encode_list(&project.tags)?)
    .bind(&project.links.live)
    .bind(&project.links.repository)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(pool)
    .await
    .context("Failed to create project")?;

    Ok(Project {
        id: result.last_insert_id() as i64,
        ..project.clone()
    })
}

async fn update_project_mysql(pool: &MySqlPool, project: &Project) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE projects
        SET title = ?, category = ?, description = ?, technologies = ?, image = ?, featured = ?,
            date = ?, gallery = ?, tags = ?, live_url = ?, repo_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&project.title)
    .bind(&project.category)
    .bind(&project.description)
    .bind(encode_list(&project.technologies)?)
    .bind(&project.image)
    .bind(project.featured)
    .bind(project.date)
    .bind(encode_list(&project.gallery)?)
    .bind(encode_list(&project.tags)?)
    .bind(&project.links.live)
    .bind(&project.links.repository)
    .bind(project.updated_at)
    .bind(project.id)
    .execute(pool)
    .await
    .context("Failed to update project")?;

    Ok(result.rows_affected() > 0)
}

fn row_to_project_mysql(row: &sqlx::mysql::MySqlRow) -> Project {
    Project {
        id: row.get("id"),
        title: row.get("title"),
        category: row.get("category"),
        description: row.get("description"),
        technologies: decode_list(row.get("technologies")),
        image: row.get("image"),
        featured: row.get("featured"),
        date: row.get("date"),
        gallery: decode_list(row.get("gallery")),
        tags: decode_list(row.get("tags")),
        links: ProjectLinks {
            live: row.get("live_url"),
            repository: row.get("repo_url"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
