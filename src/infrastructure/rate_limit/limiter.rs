//! Fixed-window rate limiter

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use crate::domain::cache::{rate_limit_key, KeyValueStore, WindowCounter};
use crate::domain::DomainError;

/// Rate limit settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub max_requests: u64,
    /// Window length in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_secs: 3600,
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u64, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Requests counted in the current window
    pub current_count: u64,
    /// Total limit for the window
    pub limit: u64,
    /// When the window resets (epoch seconds)
    pub reset_at: i64,
    /// Seconds a blocked client is told to wait
    pub retry_after: u64,
}

impl RateLimitDecision {
    /// Requests left in the window, never negative
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.current_count)
    }
}

/// Fixed-window limiter keyed by client
///
/// A burst of up to twice the limit is possible across a window boundary.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    counters: Arc<dyn WindowCounter>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create a limiter over the given store handles
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        counters: Arc<dyn WindowCounter>,
        config: RateLimitConfig,
    ) -> Self {
        Self {
            store,
            counters,
            config,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Counts one request for `client_key`; blocked requests are not counted
    pub async fn check_and_increment(
        &self,
        client_key: &str,
    ) -> Result<RateLimitDecision, DomainError> {
        let key = rate_limit_key(client_key);
        let window = self.config.window();

        let hit = self
            .counters
            .hit(&key, self.config.max_requests, window)
            .await?;

        let now = Utc::now().timestamp();
        let resets_in = hit.resets_in.unwrap_or(window);

        if !hit.allowed {
            debug!(client_key = %client_key, count = hit.count, "Rate limit exceeded");
        }

        Ok(RateLimitDecision {
            allowed: hit.allowed,
            current_count: hit.count,
            limit: self.config.max_requests,
            reset_at: now + resets_in.as_secs() as i64,
            retry_after: self.config.window_secs,
        })
    }

    /// Clears the counter for `client_key`
    pub async fn reset(&self, client_key: &str) -> Result<bool, DomainError> {
        self.store.delete(&rate_limit_key(client_key)).await
    }
}
