//! Cache infrastructure - store backends and startup selection

mod file;
mod redis;
mod selector;

pub use file::{FileStore, FileStoreConfig};
pub use redis::{RedisStore, RedisStoreConfig};
pub use selector::{SelectedStore, StoreBackend, StoreSelector, StoreSelectorConfig};
