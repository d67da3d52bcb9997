//! Key/value store capability traits

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::DomainError;

/// TTL-aware key/value store shared by every worker in the process
///
/// Values cross this trait as JSON text so it stays dyn-compatible.
/// Use [`KeyValueStoreExt`] for typed access.
#[async_trait]
pub trait KeyValueStore: Send + Sync + Debug {
    /// Gets a raw JSON value; `None` if never set, deleted, or expired
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Overwrites a raw JSON value. `None` TTL means the entry never expires.
    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError>;

    /// Deletes a value, returning whether a live entry was removed.
    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Checks if a key holds a live value
    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    /// Adds `by` to a counter, treating an absent key as 0. Keeps any existing TTL.
    async fn increment(&self, key: &str, by: i64) -> Result<i64, DomainError>;

    /// Subtracts `by` from a counter, flooring at 0. Keeps any existing TTL.
    async fn decrement(&self, key: &str, by: i64) -> Result<i64, DomainError>;

    /// Clears every entry in the store's namespace
    async fn flush(&self) -> Result<(), DomainError>;
}

/// Outcome of one fixed-window hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Whether the hit was counted
    pub allowed: bool,
    /// Counter value after the hit (unchanged when not allowed)
    pub count: u64,
    /// Time until the window resets, when the backend can tell
    pub resets_in: Option<Duration>,
}

/// Atomic check-and-increment over a fixed window
///
/// Reading the counter and incrementing it happen as one operation, so two
/// concurrent callers can never both pass the last free slot of a window.
#[async_trait]
pub trait WindowCounter: Send + Sync + Debug {
    /// Counts a hit against `key` unless it already reached `limit`.
    /// The first counted hit of a window starts its `window` expiry.
    async fn hit(&self, key: &str, limit: u64, window: Duration)
        -> Result<WindowHit, DomainError>;
}

/// Extension trait providing typed operations
pub trait KeyValueStoreExt: KeyValueStore {
    /// Gets a typed value from the store
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(|e| {
                        DomainError::storage(format!("Failed to deserialize value: {}", e))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    /// Sets a typed value in the store
    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let data = serde_json::to_string(value).map_err(|e| {
                DomainError::storage(format!("Failed to serialize value: {}", e))
            })?;
            self.set_raw(key, &data, ttl).await
        }
    }

    /// Returns the cached value, or runs `producer` once and caches its result.
    ///
    /// There is no single-flight guard: concurrent misses may each run the
    /// producer. A producer error is returned and nothing is stored.
    fn compute_if_absent<'a, V, F, Fut>(
        &'a self,
        key: &'a str,
        producer: F,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<V, DomainError>> + Send
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'a,
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<V, DomainError>> + Send + 'a,
    {
        async move {
            if let Some(cached) = self.get::<V>(key).await? {
                return Ok(cached);
            }

            let value = producer().await?;
            self.set(key, &value, ttl).await?;
            Ok(value)
        }
    }
}

// Blanket implementation for all stores, including trait objects
impl<T: KeyValueStore + ?Sized> KeyValueStoreExt for T {}
