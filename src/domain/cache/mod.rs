//! Cache domain - key/value store abstraction shared by tokens and rate limits

mod entry;
mod key;
mod repository;

pub use entry::CacheEntry;
pub use key::{key_digest, rate_limit_key, user_snapshot_key};
pub use repository::{KeyValueStore, KeyValueStoreExt, WindowCounter, WindowHit};

#[cfg(test)]
pub use repository::mock::MockStore;
