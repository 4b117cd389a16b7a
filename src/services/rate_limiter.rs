//! Login rate limiting
//!
//! Two sliding windows guard `POST /auth/login`: failed attempts per email
//! (5 per 15 minutes) and requests per client IP (10 per minute).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

const EMAIL_LIMIT: usize = 5;
const EMAIL_WINDOW_MINUTES: i64 = 15;
const IP_LIMIT: usize = 10;
const IP_WINDOW_MINUTES: i64 = 1;

/// Timestamps of recent events per key, bounded by `limit` within `window`
struct SlidingWindow<K> {
    events: Arc<RwLock<HashMap<K, Vec<DateTime<Utc>>>>>,
    limit: usize,
    window: Duration,
}

impl<K: Eq + Hash> SlidingWindow<K> {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            events: Arc::new(RwLock::new(HashMap::new())),
            limit,
            window,
        }
    }

    async fn is_limited(&self, key: K) -> bool {
        let cutoff = Utc::now() - self.window;
        let mut events = self.events.write().await;
        let times = events.entry(key).or_default();
        times.retain(|t| *t > cutoff);
        times.len() >= self.limit
    }

    async fn record(&self, key: K) {
        self.events.write().await.entry(key).or_default().push(Utc::now());
    }

    async fn clear(&self, key: &K) {
        self.events.write().await.remove(key);
    }

    /// Drop expired timestamps and keys with nothing left
    async fn prune(&self) -> usize {
        let cutoff = Utc::now() - self.window;
        let mut events = self.events.write().await;
        events.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
        events.len()
    }
}

/// Login rate limiter shared by the auth handlers
pub struct LoginRateLimiter {
    emails: SlidingWindow<String>,
    ips: SlidingWindow<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            emails: SlidingWindow::new(EMAIL_LIMIT, Duration::minutes(EMAIL_WINDOW_MINUTES)),
            ips: SlidingWindow::new(IP_LIMIT, Duration::minutes(IP_WINDOW_MINUTES)),
        }
    }

    /// Emails are compared case-insensitively
    pub async fn is_email_limited(&self, email: &str) -> bool {
        self.emails.is_limited(email.trim().to_lowercase()).await
    }

    pub async fn record_failed_attempt(&self, email: &str) {
        self.emails.record(email.trim().to_lowercase()).await;
    }

    /// Forget failures after a successful login
    pub async fn clear_email_attempts(&self, email: &str) {
        self.emails.clear(&email.trim().to_lowercase()).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.ips.is_limited(ip).await
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.ips.record(ip).await;
    }

    /// Remove stale entries. Returns the number of keys still tracked.
    pub async fn cleanup(&self) -> usize {
        self.emails.prune().await + self.ips.prune().await
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_email_limit_after_five_failures() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..EMAIL_LIMIT - 1 {
            assert!(!limiter.is_email_limited("alice@example.com").await);
            limiter.record_failed_attempt("alice@example.com").await;
        }
        limiter.record_failed_attempt("alice@example.com").await;
        assert!(limiter.is_email_limited("alice@example.com").await);
        assert!(!limiter.is_email_limited("bob@example.com").await);

        limiter.clear_email_attempts("alice@example.com").await;
        assert!(!limiter.is_email_limited("alice@example.com").await);
    }

    #[tokio::test]
    async fn test_email_keys_ignore_case() {
        let limiter = LoginRateLimiter::new();
        for email in ["Alice@Example.com", "ALICE@EXAMPLE.COM", " alice@example.com "] {
            limiter.record_failed_attempt(email).await;
        }
        assert!(!limiter.is_email_limited("alice@example.com").await);
        limiter.record_failed_attempt("alice@example.com").await;
        limiter.record_failed_attempt("alice@example.com").await;
        assert!(limiter.is_email_limited("aLiCe@example.com").await);
    }

    #[tokio::test]
    async fn test_ip_limit() {
        let limiter = LoginRateLimiter::new();
        let ip: IpAddr = "10.0.0.7".parse().unwrap();

        for _ in 0..IP_LIMIT {
            assert!(!limiter.is_ip_limited(ip).await);
            limiter.record_ip_request(ip).await;
        }
        assert!(limiter.is_ip_limited(ip).await);
        assert!(!limiter.is_ip_limited("10.0.0.8".parse().unwrap()).await);
    }

    #[tokio::test]
    async fn test_cleanup_drops_expired_entries() {
        let window = SlidingWindow::<String>::new(1, Duration::milliseconds(10));
        window.record("k".to_string()).await;
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert_eq!(window.prune().await, 0);
        assert!(!window.is_limited("k".to_string()).await);

        let limiter = LoginRateLimiter::new();
        limiter.record_failed_attempt("alice@example.com").await;
        assert_eq!(limiter.cleanup().await, 1);
    }

    proptest! {
        #[test]
        fn prop_limited_exactly_at_threshold(failures in 0usize..12) {
            let limited = tokio_test::block_on(async {
                let limiter = LoginRateLimiter::new();
                for _ in 0..failures {
                    limiter.record_failed_attempt("carol@example.com").await;
                }
                limiter.is_email_limited("Carol@Example.com").await
            });
            prop_assert_eq!(limited, failures >= EMAIL_LIMIT);
        }
    }
}
