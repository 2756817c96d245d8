use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::core::config;

/// Sliding-window rate limiter keyed by user identity.
///
/// Each user gets a fixed quota of actions per window (10 per 60 seconds by
/// default). Timestamps of recent requests are pruned on every check, so the
/// window slides instead of resetting. Shared across requests behind one
/// async mutex; concurrent checks for the same user cannot lose updates.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<Mutex<HashMap<u64, VecDeque<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    /// Create a rate limiter with the configured quota
    /// (10 requests per 60 seconds).
    pub fn new() -> Self {
        Self::with_limits(config::rate_limit::MAX_REQUESTS, config::rate_limit::window())
    }

    /// Create a rate limiter with a custom quota. Used by tests.
    pub fn with_limits(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Check whether the user may act now. Allowed requests are recorded
    /// immediately, so check-then-act is a single call.
    pub async fn is_allowed(&self, user_id: u64) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.lock().await;
        let entry = requests.entry(user_id).or_default();

        while let Some(&oldest) = entry.front() {
            if now.duration_since(oldest) >= self.window {
                entry.pop_front();
            } else {
                break;
            }
        }

        if entry.len() >= self.max_requests {
            return false;
        }

        entry.push_back(now);
        true
    }

    /// Seconds until the user's oldest recorded request leaves the window.
    /// Returns 0 when the user is not currently limited.
    pub async fn time_until_allowed(&self, user_id: u64) -> u64 {
        let now = Instant::now();
        let requests = self.requests.lock().await;
        let Some(entry) = requests.get(&user_id) else {
            return 0;
        };
        if entry.len() < self.max_requests {
            return 0;
        }
        match entry.front() {
            Some(&oldest) => {
                let elapsed = now.duration_since(oldest);
                self.window.saturating_sub(elapsed).as_secs().max(1)
            }
            None => 0,
        }
    }

    /// Drop all recorded requests for a user. Admin reset hook.
    pub async fn reset(&self, user_id: u64) {
        self.requests.lock().await.remove(&user_id);
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

    #[tokio::test(start_paused = true)]
    async fn test_quota_enforced_within_window() {
        let limiter = RateLimiter::with_limits(10, Duration::from_secs(60));
        for i in 0..10 {
            assert!(limiter.is_allowed(1).await, "request {} should pass", i + 1);
        }
        // 11th request within the same window is rejected with a positive wait
        assert!(!limiter.is_allowed(1).await);
        assert!(limiter.time_until_allowed(1).await > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = RateLimiter::with_limits(10, Duration::from_secs(60));
        for _ in 0..10 {
            assert!(limiter.is_allowed(7).await);
        }
        assert!(!limiter.is_allowed(7).await);

        tokio::time::advance(Duration::from_secs(61)).await;

        // First request of the next window is allowed again
        assert!(limiter.is_allowed(7).await);
        assert_eq!(limiter.time_until_allowed(7).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_users_are_independent() {
        let limiter = RateLimiter::with_limits(2, Duration::from_secs(60));
        assert!(limiter.is_allowed(1).await);
        assert!(limiter.is_allowed(1).await);
        assert!(!limiter.is_allowed(1).await);
        assert!(limiter.is_allowed(2).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_quota() {
        let limiter = RateLimiter::with_limits(1, Duration::from_secs(60));
        assert!(limiter.is_allowed(5).await);
        assert!(!limiter.is_allowed(5).await);
        limiter.reset(5).await;
        assert!(limiter.is_allowed(5).await);
    }
}
