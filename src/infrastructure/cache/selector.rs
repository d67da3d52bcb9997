//! Startup selection between the Redis and file stores

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::cache::{KeyValueStore, WindowCounter};
use crate::domain::DomainError;

use super::file::{FileStore, FileStoreConfig};
use super::redis::{RedisStore, RedisStoreConfig};

/// Backend chosen at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Remote,
    Local,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Remote => write!(f, "remote"),
            StoreBackend::Local => write!(f, "local"),
        }
    }
}

/// Configuration for both candidate backends
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSelectorConfig {
    pub remote: RedisStoreConfig,
    pub local: FileStoreConfig,
}

/// The store the process runs on, seen through both capabilities
#[derive(Debug, Clone)]
pub struct SelectedStore {
    pub kv: Arc<dyn KeyValueStore>,
    pub counters: Arc<dyn WindowCounter>,
    pub backend: StoreBackend,
}

impl SelectedStore {
    fn from_backend<S>(store: S, backend: StoreBackend) -> Self
    where
        S: KeyValueStore + WindowCounter + 'static,
    {
        let store = Arc::new(store);

        Self {
            kv: store.clone(),
            counters: store,
            backend,
        }
    }
}

/// Picks the store once at startup; the choice is never revisited
pub struct StoreSelector;

impl StoreSelector {
    /// Probes Redis under the configured timeout, falling back to files
    pub async fn select(config: &StoreSelectorConfig) -> Result<SelectedStore, DomainError> {
        if config.remote.enabled {
            match Self::probe(&config.remote).await {
                Ok(store) => {
                    info!(
                        host = %config.remote.host,
                        port = config.remote.port,
                        "Using Redis store"
                    );
                    return Ok(SelectedStore::from_backend(store, StoreBackend::Remote));
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        directory = %config.local.directory.display(),
                        "Redis unavailable, falling back to file store"
                    );
                }
            }
        } else {
            info!("Redis store disabled");
        }

        let store = FileStore::open(config.local.clone()).await?;
        info!(directory = %store.root().display(), "Using file store");

        Ok(SelectedStore::from_backend(store, StoreBackend::Local))
    }

    async fn probe(config: &RedisStoreConfig) -> Result<RedisStore, DomainError> {
        let timeout = config.probe_timeout();

        let connect = async {
            let store = RedisStore::connect(config.clone()).await?;
            store.ping().await?;
            Ok::<_, DomainError>(store)
        };

        tokio::time::timeout(timeout, connect).await.map_err(|_| {
            DomainError::store_unavailable(format!(
                "Redis probe timed out after {}ms",
                timeout.as_millis()
            ))
        })?
    }
}
