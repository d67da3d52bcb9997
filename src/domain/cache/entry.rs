//! Persisted cache record

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Record written by stores that manage expiry themselves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Serialized JSON value
    pub value: String,
    /// Expiration (epoch seconds), `None` never expires
    pub expires_at: Option<i64>,
    /// Creation time (epoch seconds)
    pub created_at: i64,
}

impl CacheEntry {
    pub fn new(value: impl Into<String>, ttl: Option<Duration>, now: i64) -> Self {
        Self {
            value: value.into(),
            expires_at: ttl.map(|ttl| now + ttl.as_secs().max(1) as i64),
            created_at: now,
        }
    }

    /// An entry is logically gone once `now` passes its expiry
    pub fn is_expired_at(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }

    /// Time left before expiry, `None` for entries without one
    pub fn remaining_at(&self, now: i64) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| Duration::from_secs(expires_at.saturating_sub(now).max(0) as u64))
    }
}
