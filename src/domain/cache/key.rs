//! Cache key namespaces

use sha2::{Digest, Sha256};

/// Prefix for verified-subject snapshots
pub const USER_PREFIX: &str = "user";

/// Prefix for rate-limit counters
pub const RATE_LIMIT_PREFIX: &str = "rate_limit";

/// Key for a subject snapshot: `user:<subject_id>`
pub fn user_snapshot_key(subject_id: &str) -> String {
    format!("{}:{}", USER_PREFIX, subject_id)
}

/// Key for a client's rate counter: `rate_limit:<client_key>`
pub fn rate_limit_key(client_key: &str) -> String {
    format!("{}:{}", RATE_LIMIT_PREFIX, client_key)
}

/// Hex SHA-256 digest of a key, used for content-addressed storage
pub fn key_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}
