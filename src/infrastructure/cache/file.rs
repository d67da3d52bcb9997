//! File-backed store used when Redis is unreachable

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::domain::cache::{key_digest, CacheEntry, KeyValueStore, WindowCounter, WindowHit};
use crate::domain::DomainError;

const LOCK_STRIPES: usize = 64;
const RECORD_EXTENSION: &str = "cache";

/// Configuration for the file store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileStoreConfig {
    /// Root directory holding the shard directories
    pub directory: PathBuf,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("storage/cache"),
        }
    }
}

impl FileStoreConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

/// Store keeping one JSON record per key under `<root>/<aa>/<sha256>.cache`
///
/// Every per-key operation holds a striped lock, so reads, writes and
/// lazy expiry are atomic within this process only. Several processes sharing the directory can
/// lose counter updates.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    stripes: Vec<Mutex<()>>,
}

impl FileStore {
    /// Opens the store, creating the root directory if needed
    pub async fn open(config: FileStoreConfig) -> Result<Self, DomainError> {
        fs::create_dir_all(&config.directory).await.map_err(|e| {
            DomainError::storage(format!(
                "Failed to create cache directory '{}': {}",
                config.directory.display(),
                e
            ))
        })?;

        Ok(Self {
            root: config.directory,
            stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, digest: &str) -> PathBuf {
        self.root
            .join(&digest[..2])
            .join(format!("{}.{}", digest, RECORD_EXTENSION))
    }

    fn stripe(&self, digest: &str) -> &Mutex<()> {
        let index = u8::from_str_radix(&digest[..2], 16).unwrap_or_default() as usize;
        &self.stripes[index % LOCK_STRIPES]
    }

    async fn read_entry(&self, path: &Path, now: i64) -> Result<Option<CacheEntry>, DomainError> {
        let data = match fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(DomainError::storage(format!(
                    "Failed to read '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        let entry: CacheEntry = serde_json::from_slice(&data).map_err(|e| {
            DomainError::storage(format!("Corrupt record '{}': {}", path.display(), e))
        })?;

        if entry.is_expired_at(now) {
            debug!(path = %path.display(), "Removing expired record");
            remove_record(path).await?;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn write_entry(&self, path: &Path, entry: &CacheEntry) -> Result<(), DomainError> {
        let dir = path
            .parent()
            .ok_or_else(|| DomainError::internal("Record path has no parent"))?;

        fs::create_dir_all(dir).await.map_err(|e| {
            DomainError::storage(format!("Failed to create '{}': {}", dir.display(), e))
        })?;

        let data = serde_json::to_vec(entry)
            .map_err(|e| DomainError::storage(format!("Failed to encode record: {}", e)))?;

        // Readers never observe a half-written record
        let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, &data).await.map_err(|e| {
            DomainError::storage(format!("Failed to write '{}': {}", tmp.display(), e))
        })?;

        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(DomainError::storage(format!(
                "Failed to replace '{}': {}",
                path.display(),
                e
            )));
        }

        Ok(())
    }

    async fn read_counter(&self, path: &Path, now: i64) -> Result<(i64, Option<CacheEntry>), DomainError> {
        match self.read_entry(path, now).await? {
            Some(entry) => {
                let value = entry.value.trim().parse::<i64>().map_err(|_| {
                    DomainError::storage(format!(
                        "Value at '{}' is not an integer",
                        path.display()
                    ))
                })?;
                Ok((value, Some(entry)))
            }
            None => Ok((0, None)),
        }
    }

    async fn add(&self, key: &str, delta: i64, floor_at_zero: bool) -> Result<i64, DomainError> {
        let digest = key_digest(key);
        let path = self.record_path(&digest);
        let _guard = self.stripe(&digest).lock().await;

        let now = Utc::now().timestamp();
        let (current, existing) = self.read_counter(&path, now).await?;

        let mut next = current.saturating_add(delta);
        if floor_at_zero {
            next = next.max(0);
        }

        let entry = CacheEntry {
            value: next.to_string(),
            expires_at: existing.as_ref().and_then(|e| e.expires_at),
            created_at: existing.map(|e| e.created_at).unwrap_or(now),
        };
        self.write_entry(&path, &entry).await?;

        Ok(next)
    }
}

async fn remove_record(path: &Path) -> Result<bool, DomainError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DomainError::storage(format!(
            "Failed to remove '{}': {}",
            path.display(),
            e
        ))),
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        let digest = key_digest(key);
        let path = self.record_path(&digest);
        let _guard = self.stripe(&digest).lock().await;

        let entry = self.read_entry(&path, Utc::now().timestamp()).await?;

        Ok(entry.map(|e| e.value))
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let digest = key_digest(key);
        let path = self.record_path(&digest);
        let entry = CacheEntry::new(value, ttl, Utc::now().timestamp());
        let _guard = self.stripe(&digest).lock().await;

        self.write_entry(&path, &entry).await
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let digest = key_digest(key);
        let path = self.record_path(&digest);
        let _guard = self.stripe(&digest).lock().await;

        let live = self.read_entry(&path, Utc::now().timestamp()).await?.is_some();
        if live {
            remove_record(&path).await?;
        }

        Ok(live)
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64, DomainError> {
        self.add(key, by, false).await
    }

    async fn decrement(&self, key: &str, by: i64) -> Result<i64, DomainError> {
        self.add(key, by.saturating_neg(), true).await
    }

    async fn flush(&self) -> Result<(), DomainError> {
        let mut shards = match fs::read_dir(&self.root).await {
            Ok(shards) => shards,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(DomainError::storage(format!(
                    "Failed to list '{}': {}",
                    self.root.display(),
                    e
                )));
            }
        };

        while let Some(shard) = shards
            .next_entry()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list shards: {}", e)))?
        {
            let path = shard.path();
            let is_dir = shard
                .file_type()
                .await
                .map_err(|e| DomainError::storage(format!("Failed to stat '{}': {}", path.display(), e)))?
                .is_dir();
            let result = if is_dir {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };

            result.map_err(|e| {
                DomainError::storage(format!("Failed to remove '{}': {}", path.display(), e))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl WindowCounter for FileStore {
    async fn hit(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<WindowHit, DomainError> {
        let digest = key_digest(key);
        let path = self.record_path(&digest);
        let _guard = self.stripe(&digest).lock().await;

        let now = Utc::now().timestamp();
        let (current, existing) = self.read_counter(&path, now).await?;
        let current = current.max(0) as u64;

        if current >= limit {
            return Ok(WindowHit {
                allowed: false,
                count: current,
                resets_in: existing.and_then(|e| e.remaining_at(now)),
            });
        }

        let count = current + 1;
        let entry = match existing {
            Some(entry) if entry.expires_at.is_some() => CacheEntry {
                value: count.to_string(),
                ..entry
            },
            Some(entry) => CacheEntry {
                value: count.to_string(),
                expires_at: Some(now + window.as_secs().max(1) as i64),
                ..entry
            },
            None => CacheEntry::new(count.to_string(), Some(window), now),
        };
        self.write_entry(&path, &entry).await?;

        Ok(WindowHit {
            allowed: true,
            count,
            resets_in: entry.remaining_at(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::cache::KeyValueStoreExt;
    use serde::Serialize;
    use tempfile::TempDir;

    async fn create_store() -> (TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(FileStoreConfig::new(dir.path()))
            .await
            .unwrap();
        (dir, store)
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        logins: u32,
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (_dir, store) = create_store().await;

        let profile = Profile {
            name: "ada".to_string(),
            logins: 3,
        };
        store.set("user:1", &profile, None).await.unwrap();

        let result: Option<Profile> = store.get("user:1").await.unwrap();
        assert_eq!(result, Some(profile));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (_dir, store) = create_store().await;

        let result: Option<String> = store.get("nope").await.unwrap();
        assert!(result.is_none());
        assert!(!store.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_layout() {
        let (dir, store) = create_store().await;
        store.set_raw("user:1", "\"x\"", None).await.unwrap();

        let digest = key_digest("user:1");
        let expected = dir
            .path()
            .join(&digest[..2])
            .join(format!("{}.cache", digest));
        assert!(expected.exists());

        let record: CacheEntry =
            serde_json::from_slice(&std::fs::read(expected).unwrap()).unwrap();
        assert_eq!(record.value, "\"x\"");
        assert_eq!(record.expires_at, None);
    }

    #[tokio::test]
    async fn test_ttl_expiry_removes_record() {
        let (_dir, store) = create_store().await;

        store
            .set_raw("short", "1", Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(store.exists("short").await.unwrap());

        tokio::time::sleep(Duration::from_millis(2100)).await;

        assert!(store.get_raw("short").await.unwrap().is_none());
        assert!(!store.record_path(&key_digest("short")).exists());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = create_store().await;
        store.set_raw("k", "1", None).await.unwrap();

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_increment_and_decrement() {
        let (_dir, store) = create_store().await;

        assert_eq!(store.increment("c", 1).await.unwrap(), 1);
        assert_eq!(store.increment("c", 4).await.unwrap(), 5);
        assert_eq!(store.decrement("c", 2).await.unwrap(), 3);
        assert_eq!(store.decrement("c", 10).await.unwrap(), 0);
        assert_eq!(store.decrement("fresh", 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_increment_keeps_ttl() {
        let (_dir, store) = create_store().await;
        store
            .set_raw("c", "7", Some(Duration::from_secs(60)))
            .await
            .unwrap();

        let path = store.record_path(&key_digest("c"));
        let before: CacheEntry = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();

        assert_eq!(store.increment("c", 1).await.unwrap(), 8);

        let after: CacheEntry = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(after.expires_at, before.expires_at);
        assert_eq!(after.value, "8");
    }

    #[tokio::test]
    async fn test_increment_non_integer_fails() {
        let (_dir, store) = create_store().await;
        store.set("c", &"text", None).await.unwrap();

        let result = store.increment("c", 1).await;
        assert!(matches!(result, Err(DomainError::Storage { .. })));
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let (_dir, store) = create_store().await;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment("shared", 1).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.get::<i64>("shared").await.unwrap(), Some(20));
    }

    #[tokio::test]
    async fn test_window_hit_stops_at_limit() {
        let (_dir, store) = create_store().await;
        let window = Duration::from_secs(60);

        let mut hits = Vec::new();
        for _ in 0..4 {
            hits.push(store.hit("w", 3, window).await.unwrap());
        }

        assert_eq!(
            hits.iter().map(|h| h.allowed).collect::<Vec<_>>(),
            vec![true, true, true, false]
        );
        assert_eq!(hits[3].count, 3);
        assert_eq!(store.get::<i64>("w").await.unwrap(), Some(3));

        let resets_in = hits[0].resets_in.unwrap();
        assert!(resets_in <= window && resets_in >= Duration::from_secs(59));
    }

    #[tokio::test]
    async fn test_concurrent_hits_respect_limit() {
        let (_dir, store) = create_store().await;
        let store = Arc::new(store);

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.hit("burst", 4, Duration::from_secs(60)).await })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().allowed {
                allowed += 1;
            }
        }

        assert_eq!(allowed, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_set_survives_concurrent_expiry() {
        let (_dir, store) = create_store().await;
        let store = Arc::new(store);
        let path = store.record_path(&key_digest("k"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        for i in 0..200 {
            let expired = CacheEntry {
                value: "\"old\"".to_string(),
                expires_at: Some(Utc::now().timestamp() - 10),
                created_at: 0,
            };
            std::fs::write(&path, serde_json::to_vec(&expired).unwrap()).unwrap();

            let reader = {
                let store = store.clone();
                tokio::spawn(async move { store.get_raw("k").await })
            };
            let writer = {
                let store = store.clone();
                let value = i.to_string();
                tokio::spawn(async move { store.set_raw("k", &value, None).await })
            };

            reader.await.unwrap().unwrap();
            writer.await.unwrap().unwrap();

            assert_eq!(store.get_raw("k").await.unwrap(), Some(i.to_string()));
        }
    }

    #[tokio::test]
    async fn test_flush() {
        let (dir, store) = create_store().await;
        store.set_raw("a", "1", None).await.unwrap();
        store.set_raw("b", "2", None).await.unwrap();

        store.flush().await.unwrap();

        assert!(!store.exists("a").await.unwrap());
        assert!(!store.exists("b").await.unwrap());
        assert!(dir.path().exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_storage_error() {
        let (_dir, store) = create_store().await;
        let path = store.record_path(&key_digest("bad"));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not json").unwrap();

        let result = store.get_raw("bad").await;
        assert!(matches!(result, Err(DomainError::Storage { .. })));
    }
}
