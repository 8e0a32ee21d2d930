//! Blog service
//!
//! Posts are written in Markdown; HTML and the excerpt are derived on
//! save. Slugs come from the title unless given, and are made unique with a
//! numeric suffix.

use crate::cache::{keys, Cache};
use crate::db::repositories::PostRepository;
use crate::models::{Post, PostInput};
use crate::services::markdown::MarkdownRenderer;
use crate::services::validation::{validate_post, ValidationErrors};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

const EXCERPT_CHARS: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum BlogError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Post not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct BlogService {
    repo: Arc<dyn PostRepository>,
    cache: Arc<Cache>,
    cache_ttl: Duration,
    renderer: MarkdownRenderer,
}

/// URL slug from a title: ASCII letters and digits, words joined by `-`
pub fn generate_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}

impl BlogService {
    pub fn new(repo: Arc<dyn PostRepository>, cache: Arc<Cache>, cache_ttl: Duration) -> Self {
        Self {
            repo,
            cache,
            cache_ttl,
            renderer: MarkdownRenderer::new(),
        }
    }

    pub async fn list_published(&self) -> Result<Vec<Post>, BlogError> {
        if let Some(cached) = self.cache.get_or_miss::<Vec<Post>>(keys::POSTS_PUBLISHED).await {
            return Ok(cached);
        }
        let posts = self.repo.list(true).await.context("Failed to list posts")?;
        self.cache
            .put(keys::POSTS_PUBLISHED, &posts, self.cache_ttl)
            .await;
        Ok(posts)
    }

    /// Drafts included
    pub async fn list_all(&self) -> Result<Vec<Post>, BlogError> {
        Ok(self.repo.list(false).await.context("Failed to list posts")?)
    }

    /// A published post by slug; drafts read as not found
    pub async fn get_published(&self, slug: &str) -> Result<Post, BlogError> {
        let key = keys::post_slug(slug);
        if let Some(post) = self.cache.get_or_miss::<Post>(&key).await {
            return Ok(post);
        }
        let post = self
            .repo
            .get_by_slug(slug)
            .await
            .context("Failed to get post by slug")?
            .filter(|p| p.published)
            .ok_or(BlogError::NotFound)?;
        self.cache.put(&key, &post, self.cache_ttl).await;
        Ok(post)
    }

    /// Drafts included
    pub async fn count(&self) -> Result<i64, BlogError> {
        Ok(self.repo.count().await.context("Failed to count posts")?)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Post, BlogError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(BlogError::NotFound)
    }

    pub async fn create(&self, input: &PostInput) -> Result<Post, BlogError> {
        validate_post(input)?;
        let slug = self.unique_slug(&self.requested_slug(input), None).await?;
        let now = Utc::now();

        let post = Post {
            id: 0,
            slug,
            title: input.title.trim().to_string(),
            excerpt: self.excerpt_for(input),
            content: input.content.clone(),
            content_html: self.renderer.render(&input.content),
            author: input.author.trim().to_string(),
            tags: clean_tags(&input.tags),
            published: input.published,
            published_at: input.published.then_some(now),
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&post).await.context("Failed to create post")?;
        self.cache.invalidate(keys::POSTS_PATTERN).await;
        tracing::info!("Post {} created: {}", created.id, created.slug);
        Ok(created)
    }

    pub async fn update(&self, id: i64, input: &PostInput) -> Result<Post, BlogError> {
        let existing = self.get_by_id(id).await?;
        validate_post(input)?;

        // Keep the slug stable unless one is explicitly requested
        let slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(requested) if requested != existing.slug => {
                self.unique_slug(requested, Some(id)).await?
            }
            _ => existing.slug.clone(),
        };
        let now = Utc::now();
        let published_at = match (input.published, existing.published_at) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(now),
            (false, _) => None,
        };

        let post = Post {
            slug,
            title: input.title.trim().to_string(),
            excerpt: self.excerpt_for(input),
            content: input.content.clone(),
            content_html: self.renderer.render(&input.content),
            author: input.author.trim().to_string(),
            tags: clean_tags(&input.tags),
            published: input.published,
            published_at,
            updated_at: now,
            ..existing
        };

        if !self.repo.update(&post).await.context("Failed to update post")? {
            return Err(BlogError::NotFound);
        }
        self.cache.invalidate(keys::POSTS_PATTERN).await;
        Ok(post)
    }

    pub async fn delete(&self, id: i64) -> Result<(), BlogError> {
        if !self.repo.delete(id).await.context("Failed to delete post")? {
            return Err(BlogError::NotFound);
        }
        self.cache.invalidate(keys::POSTS_PATTERN).await;
        tracing::info!("Post {} deleted", id);
        Ok(())
    }

    fn requested_slug(&self, input: &PostInput) -> String {
        match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(slug) => slug.to_string(),
            None => generate_slug(&input.title),
        }
    }

    fn excerpt_for(&self, input: &PostInput) -> String {
        let excerpt = input.excerpt.trim();
        if excerpt.is_empty() {
            self.renderer.excerpt(&input.content, EXCERPT_CHARS)
        } else {
            excerpt.to_string()
        }
    }

    async fn unique_slug(&self, base: &str, exclude_id: Option<i64>) -> Result<String, BlogError> {
        let mut candidate = base.to_string();
        let mut suffix = 2;
        while self
            .repo
            .slug_exists(&candidate, exclude_id)
            .await
            .context("Failed to check post slug")?
        {
            candidate = format!("{}-{}", base, suffix);
            suffix += 1;
        }
        Ok(candidate)
    }
}

fn clean_tags(tags: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !cleaned.iter().any(|c| c.eq_ignore_ascii_case(tag)) {
            cleaned.push(tag.to_string());
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::SqlxPostRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> BlogService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        BlogService::new(
            SqlxPostRepository::boxed(pool),
            Arc::new(Cache::Memory(MemoryCache::new())),
            Duration::from_secs(60),
        )
    }

    fn input(title: &str, published: bool) -> PostInput {
        PostInput {
            title: title.to_string(),
            content: "Some **markdown** body that is long enough.".to_string(),
            author: "Team".to_string(),
            tags: vec!["rust".into(), "Rust".into(), " ".into()],
            published,
            ..Default::default()
        }
    }

    #[test]
    fn test_generate_slug() {
        assert_eq!(generate_slug("Hello, World!"), "hello-world");
        assert_eq!(generate_slug("  Why   we_use Rust  "), "why-we-use-rust");
        assert_eq!(generate_slug("Café 2024"), "caf-2024");
        assert_eq!(generate_slug("!!!"), "post");
    }

    #[tokio::test]
    async fn test_create_derives_fields() {
        let blog = setup().await;
        let post = blog.create(&input("Shipping Faster", true)).await.unwrap();
        assert_eq!(post.slug, "shipping-faster");
        assert!(post.content_html.contains("<strong>markdown</strong>"));
        assert_eq!(post.excerpt, "Some markdown body that is long enough.");
        assert_eq!(post.tags, vec!["rust"]);
        assert!(post.published_at.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_titles_get_suffixes() {
        let blog = setup().await;
        let a = blog.create(&input("Launch", true)).await.unwrap();
        let b = blog.create(&input("Launch", true)).await.unwrap();
        let c = blog.create(&input("Launch", true)).await.unwrap();
        assert_eq!(a.slug, "launch");
        assert_eq!(b.slug, "launch-2");
        assert_eq!(c.slug, "launch-3");
    }

    #[tokio::test]
    async fn test_drafts_hidden_from_public() {
        let blog = setup().await;
        let draft = blog.create(&input("Draft", false)).await.unwrap();
        blog.create(&input("Live", true)).await.unwrap();

        assert_eq!(blog.list_published().await.unwrap().len(), 1);
        assert_eq!(blog.list_all().await.unwrap().len(), 2);
        assert!(matches!(blog.get_published(&draft.slug).await, Err(BlogError::NotFound)));
    }

    #[tokio::test]
    async fn test_publishing_invalidates_listing() {
        let blog = setup().await;
        let draft = blog.create(&input("Later", false)).await.unwrap();
        assert!(blog.list_published().await.unwrap().is_empty());

        let updated = blog.update(draft.id, &input("Later", true)).await.unwrap();
        assert_eq!(updated.slug, "later");
        assert!(updated.published_at.is_some());
        assert_eq!(blog.list_published().await.unwrap().len(), 1);
        assert_eq!(blog.get_published("later").await.unwrap().id, draft.id);
    }

    #[tokio::test]
    async fn test_delete_missing_post() {
        let blog = setup().await;
        assert!(matches!(blog.delete(42).await, Err(BlogError::NotFound)));
    }
}
