//! Cache layer
//!
//! Public listings (projects, services, testimonials, published posts) are
//! cached here and invalidated by key pattern whenever the admin writes.
//!
//! - In-memory cache (moka), the default for a single instance
//! - Redis cache behind the `redis-cache` feature
//!
//! ```rust,ignore
//! use devstudio::cache::{create_cache, CacheLayer};
//! use devstudio::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default()).await?;
//! cache.set("projects:all", &projects, Duration::from_secs(60)).await?;
//! ```

pub mod memory;
#[cfg(feature = "redis-cache")]
pub mod redis;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, CacheDriver};

/// Cache keys and the patterns that invalidate them
pub mod keys {
    pub const PROJECTS: &str = "projects:all";
    pub const PROJECTS_PATTERN: &str = "projects:*";
    pub const SERVICES: &str = "services:all";
    pub const SERVICES_PATTERN: &str = "services:*";
    pub const TESTIMONIALS: &str = "testimonials:all";
    pub const TESTIMONIALS_PATTERN: &str = "testimonials:*";
    pub const POSTS_PUBLISHED: &str = "posts:published";
    pub const POSTS_PATTERN: &str = "posts:*";

    pub fn post_slug(slug: &str) -> String {
        format!("posts:slug:{}", slug)
    }
}

/// Cache layer trait
///
/// The methods are generic, so this cannot be a trait object.
/// Use the `Cache` enum for runtime selection.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every key matching a glob pattern (`*` and `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

pub use memory::MemoryCache;
#[cfg(feature = "redis-cache")]
pub use redis::RedisCache;

/// Runtime-selected cache backend
#[derive(Debug)]
pub enum Cache {
    Memory(MemoryCache),
    #[cfg(feature = "redis-cache")]
    Redis(RedisCache),
}

#[async_trait]
impl CacheLayer for Cache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Cache::Memory(cache) => cache.get(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.set(key, value, ttl).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete(key).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.delete(key).await,
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete_pattern(pattern).await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.delete_pattern(pattern).await,
        }
    }

    async fn clear(&self) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.clear().await,
            #[cfg(feature = "redis-cache")]
            Cache::Redis(cache) => cache.clear().await,
        }
    }
}

impl Cache {
    /// Read a cached value, logging and treating backend errors as a miss
    pub async fn get_or_miss<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        match self.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {:#}", key, e);
                None
            }
        }
    }

    /// Store a value; failures are logged, never surfaced
    pub async fn put<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) {
        if let Err(e) = self.set(key, value, ttl).await {
            tracing::warn!("Cache write failed for {}: {:#}", key, e);
        }
    }

    /// Drop every key under a pattern; failures are logged
    pub async fn invalidate(&self, pattern: &str) {
        if let Err(e) = self.delete_pattern(pattern).await {
            tracing::warn!("Cache invalidation failed for {}: {:#}", pattern, e);
        }
    }
}

/// Create the configured cache backend
///
/// # Errors
/// - Redis is configured but the `redis-cache` feature is off
/// - Redis is configured without a URL, or the connection fails
pub async fn create_cache(config: &CacheConfig) -> Result<Arc<Cache>> {
    let ttl = Duration::from_secs(config.ttl_seconds);

    match config.driver {
        CacheDriver::Memory => {
            let cache = MemoryCache::with_capacity_and_ttl(10_000, ttl);
            Ok(Arc::new(Cache::Memory(cache)))
        }
        CacheDriver::Redis => {
            #[cfg(feature = "redis-cache")]
            {
                let redis_url = config.redis_url.as_ref().ok_or_else(|| {
                    anyhow::anyhow!(
                        "Redis URL is required when using Redis cache driver. \
                         Set 'redis_url' in cache configuration or use DEVSTUDIO_CACHE_REDIS_URL environment variable."
                    )
                })?;

                let cache = RedisCache::with_ttl(redis_url, ttl).await?;
                Ok(Arc::new(Cache::Redis(cache)))
            }

            #[cfg(not(feature = "redis-cache"))]
            {
                anyhow::bail!(
                    "Redis cache driver is configured but the 'redis-cache' feature is not enabled. \
                     Either enable the feature with `--features redis-cache` or use 'memory' cache driver."
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_cache() {
        let cache = create_cache(&CacheConfig::default()).await.unwrap();

        cache
            .set(keys::PROJECTS, &vec!["a".to_string()], Duration::from_secs(60))
            .await
            .unwrap();
        let result: Option<Vec<String>> = cache.get(keys::PROJECTS).await.unwrap();
        assert_eq!(result, Some(vec!["a".to_string()]));
    }

    #[tokio::test]
    async fn test_invalidate_only_touches_pattern() {
        let cache = create_cache(&CacheConfig::default()).await.unwrap();
        let ttl = Duration::from_secs(60);

        cache.put(keys::POSTS_PUBLISHED, &1, ttl).await;
        cache.put(&keys::post_slug("hello"), &2, ttl).await;
        cache.put(keys::SERVICES, &3, ttl).await;

        cache.invalidate(keys::POSTS_PATTERN).await;

        assert_eq!(cache.get_or_miss::<i32>(keys::POSTS_PUBLISHED).await, None);
        assert_eq!(cache.get_or_miss::<i32>(&keys::post_slug("hello")).await, None);
        assert_eq!(cache.get_or_miss::<i32>(keys::SERVICES).await, Some(3));
    }

    #[tokio::test]
    async fn test_type_mismatch_reads_as_miss() {
        let cache = create_cache(&CacheConfig::default()).await.unwrap();
        cache.put("k", &"text", Duration::from_secs(60)).await;
        assert_eq!(cache.get_or_miss::<i64>("k").await, None);
    }

    #[cfg(not(feature = "redis-cache"))]
    #[tokio::test]
    async fn test_create_redis_cache_without_feature() {
        let config = CacheConfig {
            driver: CacheDriver::Redis,
            redis_url: Some("redis://localhost:6379".to_string()),
            ttl_seconds: 600,
        };

        let err = create_cache(&config).await.unwrap_err().to_string();
        assert!(err.contains("redis-cache") && err.contains("feature"));
    }

    #[cfg(feature = "redis-cache")]
    #[tokio::test]
    async fn test_create_redis_cache_without_url() {
        let config = CacheConfig {
            driver: CacheDriver::Redis,
            redis_url: None,
            ttl_seconds: 600,
        };

        let err = create_cache(&config).await.unwrap_err().to_string();
        assert!(err.contains("Redis URL"));
    }
}
