//! Domain layer - Core contracts and entities

pub mod cache;
pub mod error;
pub mod subject;
pub mod token;

pub use cache::{
    rate_limit_key, user_snapshot_key, CacheEntry, KeyValueStore, KeyValueStoreExt,
    WindowCounter, WindowHit,
};
pub use error::DomainError;
pub use subject::{SubjectDirectory, SubjectSnapshot};
pub use token::{SubjectClaims, TokenClaims, TokenKind, TokenPair, TokenService};
