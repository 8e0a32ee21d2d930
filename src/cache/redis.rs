//! Redis cache for multi-instance deployments
//!
//! Values are JSON strings written with SETEX. Pattern deletion walks the
//! keyspace with SCAN rather than KEYS so the server is never blocked.
//! Every key is namespaced with `devstudio:` so `clear` only touches ours.

use super::CacheLayer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

const DEFAULT_TTL: Duration = Duration::from_secs(600);

const SCAN_COUNT: usize = 100;

const KEY_PREFIX: &str = "devstudio:";

pub struct RedisCache {
    connection: MultiplexedConnection,
    default_ttl: Duration,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    pub async fn new(redis_url: &str) -> Result<Self> {
        Self::with_ttl(redis_url, DEFAULT_TTL).await
    }

    pub async fn with_ttl(redis_url: &str, default_ttl: Duration) -> Result<Self> {
        let client = Client::open(redis_url).context("Failed to create Redis client")?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            connection,
            default_ttl,
        })
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn namespaced(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }

    async fn delete_matching(&self, pattern: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .context("Failed to scan keys in Redis")?;

            if !keys.is_empty() {
                let _: () = conn
                    .del(&keys)
                    .await
                    .context("Failed to delete keys from Redis")?;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CacheLayer for RedisCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.connection.clone();
        let result: Option<String> = conn
            .get(Self::namespaced(key))
            .await
            .context("Failed to get value from Redis")?;

        result
            .map(|json| serde_json::from_str(&json).context("Failed to deserialize cached value"))
            .transpose()
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(value).context("Failed to serialize cache value")?;
        let ttl_secs = ttl.min(self.default_ttl).as_secs().max(1);

        let _: () = conn
            .set_ex(Self::namespaced(key), json, ttl_secs)
            .await
            .context("Failed to set value in Redis")?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .del(Self::namespaced(key))
            .await
            .context("Failed to delete key from Redis")?;
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        self.delete_matching(&Self::namespaced(pattern)).await
    }

    async fn clear(&self) -> Result<()> {
        self.delete_matching(&Self::namespaced("*")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
    }

    // Run with: cargo test --features redis-cache -- --ignored

    #[tokio::test]
    #[ignore = "requires running Redis server"]
    async fn test_set_get_delete() {
        let cache = RedisCache::new(&redis_url()).await.unwrap();
        cache.set("test:k", &"v".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get::<String>("test:k").await.unwrap(), Some("v".to_string()));

        cache.delete("test:k").await.unwrap();
        assert_eq!(cache.get::<String>("test:k").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires running Redis server"]
    async fn test_delete_pattern() {
        let cache = RedisCache::new(&redis_url()).await.unwrap();
        let ttl = Duration::from_secs(60);
        cache.set("test:projects:all", &1, ttl).await.unwrap();
        cache.set("test:projects:3", &2, ttl).await.unwrap();
        cache.set("test:services:all", &3, ttl).await.unwrap();

        cache.delete_pattern("test:projects:*").await.unwrap();

        assert_eq!(cache.get::<i32>("test:projects:all").await.unwrap(), None);
        assert_eq!(cache.get::<i32>("test:projects:3").await.unwrap(), None);
        assert_eq!(cache.get::<i32>("test:services:all").await.unwrap(), Some(3));

        cache.delete("test:services:all").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires running Redis server"]
    async fn test_ttl_expiration() {
        let cache = RedisCache::new(&redis_url()).await.unwrap();
        cache.set("test:ttl", &"v", Duration::from_secs(1)).await.unwrap();
        assert!(cache.get::<String>("test:ttl").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cache.get::<String>("test:ttl").await.unwrap(), None);
    }
}
