//! Blog post repository

use super::{decode_list, encode_list};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Post;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const POST_COLUMNS: &str = "id, slug, title, excerpt, content, content_html, author, tags, published, published_at, created_at, updated_at";

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Posts, newest publication first. Drafts only when `published_only` is false.
    async fn list(&self, published_only: bool) -> Result<Vec<Post>>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;
    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>>;
    /// Whether a slug is taken by a post other than `exclude_id`
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;
    async fn create(&self, post: &Post) -> Result<Post>;
    async fn update(&self, post: &Post) -> Result<bool>;
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn count(&self) -> Result<i64>;
}

pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn list(&self, published_only: bool) -> Result<Vec<Post>> {
        let filter = if published_only { "WHERE published = 1" } else { "" };
        let sql = format!(
            "SELECT {} FROM posts {} ORDER BY COALESCE(published_at, created_at) DESC, id DESC",
            POST_COLUMNS, filter
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list posts")?;
                Ok(rows.iter().map(row_to_post_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list posts")?;
                Ok(rows.iter().map(row_to_post_mysql).collect())
            }
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get post by ID")?;
                Ok(row.as_ref().map(row_to_post_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get post by ID")?;
                Ok(row.as_ref().map(row_to_post_mysql))
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE slug = ?", POST_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get post by slug")?;
                Ok(row.as_ref().map(row_to_post_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get post by slug")?;
                Ok(row.as_ref().map(row_to_post_mysql))
            }
        }
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        const SQL: &str = "SELECT COUNT(*) as count FROM posts WHERE slug = ? AND id != ?";
        let exclude = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check post slug")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to check post slug")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn create(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, post).await,
        }
    }

    async fn update(&self, post: &Post) -> Result<bool> {
        const SQL: &str = r#"
            UPDATE posts
            SET slug = ?, title = ?, excerpt = ?, content = ?, content_html = ?, author = ?,
                tags = ?, published = ?, published_at = ?, updated_at = ?
            WHERE id = ?
        "#;
        let tags = encode_list(&post.tags)?;
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(&post.slug)
                .bind(&post.title)
                .bind(&post.excerpt)
                .bind(&post.content)
                .bind(&post.content_html)
                .bind(&post.author)
                .bind(&tags)
                .bind(post.published)
                .bind(post.published_at)
                .bind(post.updated_at)
                .bind(post.id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(&post.slug)
                .bind(&post.title)
                .bind(&post.excerpt)
                .bind(&post.content)
                .bind(&post.content_html)
                .bind(&post.author)
                .bind(&tags)
                .bind(post.published)
                .bind(post.published_at)
                .bind(post.updated_at)
                .bind(post.id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        const SQL: &str = "DELETE FROM posts WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count(&self) -> Result<i64> {
        const SQL: &str = "SELECT COUNT(*) as count FROM posts";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SQL)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count posts")?
                .get("count"),
            DatabaseDriver::Mysql => sqlx::query(SQL)
                .fetch_one(self.pool.mysql()?)
                .await
                .context("Failed to count posts")?
                .get("count"),
        };
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (slug, title, excerpt, content, content_html, author, tags, published,
                           published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.excerpt)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.author)
    .bind(encode_list(&post.tags)?)
    .bind(post.published)
    .bind(post.published_at)
    .bind(post.created_at)
    .bind(post.updated_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        ..post.clone()
    })
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Post {
    Post {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        author: row.get("author"),
        tags: decode_list(row.get("tags")),
        published: row.get("published"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &Post) -> Result<Post> {
    let result = sqlx::query(
        r#"
        INSERT INTO posts (slug, title, excerpt, content, content_html, author, tags, published,
                           published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.excerpt)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.author)
    .bind(encode_list(&post.tags)?)
    .bind(post.published)
    .bind(post.published_at)
    .bind(post.created_at)
    .bind(post.updated_at)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        ..post.clone()
    })
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Post {
    Post {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        author: row.get("author"),
        tags: decode_list(row.get("tags")),
        published: row.get("published"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::{Duration, Utc};

    async fn setup_test_repo() -> SqlxPostRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        SqlxPostRepository::new(pool)
    }

    fn sample(slug: &str, published: bool, age_days: i64) -> Post {
        let at = Utc::now() - Duration::days(age_days);
        Post {
            id: 0,
            slug: slug.to_string(),
            title: slug.to_string(),
            excerpt: String::new(),
            content: "# Hello".to_string(),
            content_html: "<h1>Hello</h1>".to_string(),
            author: "Team".to_string(),
            tags: vec!["news".to_string()],
            published,
            published_at: published.then_some(at),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_published_filter_and_order() {
        let repo = setup_test_repo().await;
        repo.create(&sample("older", true, 10)).await.unwrap();
        repo.create(&sample("draft", false, 0)).await.unwrap();
        repo.create(&sample("newer", true, 1)).await.unwrap();

        let published: Vec<String> = repo
            .list(true)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.slug)
            .collect();
        assert_eq!(published, vec!["newer", "older"]);
        assert_eq!(repo.list(false).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_slug_lookup_and_uniqueness() {
        let repo = setup_test_repo().await;
        let post = repo.create(&sample("hello-world", true, 0)).await.unwrap();

        let found = repo.get_by_slug("hello-world").await.unwrap().unwrap();
        assert_eq!(found.id, post.id);
        assert_eq!(found.tags, vec!["news"]);

        assert!(repo.slug_exists("hello-world", None).await.unwrap());
        assert!(!repo.slug_exists("hello-world", Some(post.id)).await.unwrap());
        assert!(repo.create(&sample("hello-world", false, 0)).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete_post() {
        let repo = setup_test_repo().await;
        let mut post = repo.create(&sample("draft", false, 0)).await.unwrap();
        post.published = true;
        post.published_at = Some(Utc::now());
        assert!(repo.update(&post).await.unwrap());
        assert!(repo.get_by_id(post.id).await.unwrap().unwrap().published);

        assert!(repo.delete(post.id).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
