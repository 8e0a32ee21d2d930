//! Rate limiting for login and lead-capture forms
//!
//! Two independent controls:
//! - failed logins per username (5 per 15 minutes), cleared on success
//! - requests per client IP, in a sliding window that depends on the bucket

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::RwLock;

const USERNAME_MAX_FAILURES: usize = 5;
const USERNAME_WINDOW_MINUTES: i64 = 15;

/// Which endpoint family a request counts against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Login attempts: 10 per minute
    Login,
    /// Contact and newsletter submissions: 5 per minute
    Form,
}

impl Bucket {
    fn limit(self) -> usize {
        match self {
            Bucket::Login => 10,
            Bucket::Form => 5,
        }
    }

    fn window(self) -> Duration {
        Duration::minutes(1)
    }
}

pub struct RateLimiter {
    username_failures: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
    ip_requests: RwLock<HashMap<(Bucket, IpAddr), Vec<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            username_failures: RwLock::new(HashMap::new()),
            ip_requests: RwLock::new(HashMap::new()),
        }
    }

    /// Whether the username is locked out after repeated failures
    pub async fn is_username_limited(&self, username: &str) -> bool {
        let mut failures = self.username_failures.write().await;
        let cutoff = Utc::now() - Duration::minutes(USERNAME_WINDOW_MINUTES);

        let entry = failures.entry(username.to_lowercase()).or_default();
        entry.retain(|time| *time > cutoff);
        entry.len() >= USERNAME_MAX_FAILURES
    }

    pub async fn record_failed_attempt(&self, username: &str) {
        let mut failures = self.username_failures.write().await;
        failures
            .entry(username.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures for a username (after a successful login)
    pub async fn clear_username_attempts(&self, username: &str) {
        self.username_failures
            .write()
            .await
            .remove(&username.to_lowercase());
    }

    /// Count a request from `ip` and report whether it exceeds the bucket.
    ///
    /// Rejected requests are not recorded, so a client that backs off
    /// regains access once the window slides past its earlier requests.
    pub async fn check_ip(&self, bucket: Bucket, ip: IpAddr) -> bool {
        let mut requests = self.ip_requests.write().await;
        let now = Utc::now();
        let cutoff = now - bucket.window();

        let entry = requests.entry((bucket, ip)).or_default();
        entry.retain(|time| *time > cutoff);
        if entry.len() >= bucket.limit() {
            return true;
        }
        entry.push(now);
        false
    }

    /// Drop expired entries; run periodically
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let username_cutoff = now - Duration::minutes(USERNAME_WINDOW_MINUTES);

        {
            let mut failures = self.username_failures.write().await;
            failures.retain(|_, times| {
                times.retain(|time| *time > username_cutoff);
                !times.is_empty()
            });
        }

        {
            let mut requests = self.ip_requests.write().await;
            requests.retain(|(bucket, _), times| {
                let cutoff = now - bucket.window();
                times.retain(|time| *time > cutoff);
                !times.is_empty()
            });
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_username_rate_limit() {
        let limiter = RateLimiter::new();

        for _ in 0..4 {
            assert!(!limiter.is_username_limited("admin").await);
            limiter.record_failed_attempt("admin").await;
        }
        limiter.record_failed_attempt("admin").await;
        assert!(limiter.is_username_limited("admin").await);

        limiter.clear_username_attempts("admin").await;
        assert!(!limiter.is_username_limited("admin").await);
    }

    #[tokio::test]
    async fn test_case_insensitive_username() {
        let limiter = RateLimiter::new();
        for name in ["Admin", "admin", "ADMIN", "aDmin", "admiN"] {
            limiter.record_failed_attempt(name).await;
        }
        assert!(limiter.is_username_limited("admin").await);
    }

    #[tokio::test]
    async fn test_form_bucket_limit() {
        let limiter = RateLimiter::new();
        let ip = IpAddr::from_str("203.0.113.7").unwrap();

        for _ in 0..5 {
            assert!(!limiter.check_ip(Bucket::Form, ip).await);
        }
        assert!(limiter.check_ip(Bucket::Form, ip).await);

        // Buckets are independent
        assert!(!limiter.check_ip(Bucket::Login, ip).await);
        // And so are clients
        let other = IpAddr::from_str("203.0.113.8").unwrap();
        assert!(!limiter.check_ip(Bucket::Form, other).await);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_entries() {
        let limiter = RateLimiter::new();
        let ip = IpAddr::from_str("127.0.0.1").unwrap();
        for _ in 0..5 {
            limiter.check_ip(Bucket::Form, ip).await;
        }
        limiter.cleanup().await;
        assert!(limiter.check_ip(Bucket::Form, ip).await);
    }
}
