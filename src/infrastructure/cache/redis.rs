//! Redis store implementation

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{
    AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, Script,
};
use serde::Deserialize;

use crate::domain::cache::{KeyValueStore, WindowCounter, WindowHit};
use crate::domain::DomainError;

/// Floors the counter at zero and keeps its TTL
const DECREMENT_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local next = current - tonumber(ARGV[1])
if next < 0 then next = 0 end
redis.call('SET', KEYS[1], next, 'KEEPTTL')
return next
"#;

/// Fixed-window check-and-increment: returns {allowed, count, ttl}
const WINDOW_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current >= tonumber(ARGV[1]) then
  return {0, current, redis.call('TTL', KEYS[1])}
end
local count = redis.call('INCR', KEYS[1])
if redis.call('TTL', KEYS[1]) < 0 then
  redis.call('EXPIRE', KEYS[1], ARGV[2])
end
return {1, count, redis.call('TTL', KEYS[1])}
"#;

/// Configuration for the Redis store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisStoreConfig {
    /// Whether to try Redis at all
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub database: i64,
    /// Key prefix for namespacing
    pub namespace: Option<String>,
    /// Upper bound for connect + PING at startup
    pub probe_timeout_ms: u64,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            database: 0,
            namespace: None,
            probe_timeout_ms: 2000,
        }
    }
}

impl RedisStoreConfig {
    /// Creates a configuration for the given host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Sets the key namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the probe timeout
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Structured connection info; the password is passed as-is, never URL-encoded
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.database,
                password: self.password.clone(),
                ..Default::default()
            },
        }
    }
}

/// Redis-backed store shared by every process pointing at the same server
///
/// TTL and counters are native Redis primitives; decrement and the window
/// hit run as Lua scripts so they stay atomic at the server.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    config: RedisStoreConfig,
    decrement_script: Script,
    window_script: Script,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("database", &self.config.database)
            .field("namespace", &self.config.namespace)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisStore {
    /// Connects once; failures surface as `StoreUnavailable`
    pub async fn connect(config: RedisStoreConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.connection_info()).map_err(|e| {
            DomainError::store_unavailable(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            DomainError::store_unavailable(format!("Failed to connect to Redis: {}", e))
        })?;

        Ok(Self {
            connection,
            config,
            decrement_script: Script::new(DECREMENT_SCRIPT),
            window_script: Script::new(WINDOW_SCRIPT),
        })
    }

    /// Liveness probe
    pub async fn ping(&self) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();

        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::store_unavailable(format!("PING failed: {}", e)))?;

        if reply == "PONG" {
            Ok(())
        } else {
            Err(DomainError::store_unavailable(format!(
                "Unexpected PING reply: {}",
                reply
            )))
        }
    }

    fn prefix_key(&self, key: &str) -> String {
        match &self.config.namespace {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    async fn delete_namespace(&self, prefix: &str) -> Result<usize, DomainError> {
        let pattern = format!("{}:*", prefix);
        let mut conn = self.connection.clone();

        // SCAN rather than KEYS to avoid blocking the server
        let mut cursor = 0u64;
        let mut total_deleted = 0usize;

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    DomainError::store_unavailable(format!(
                        "Failed to scan namespace '{}': {}",
                        prefix, e
                    ))
                })?;

            if !keys.is_empty() {
                let deleted: i64 = conn.del(&keys).await.map_err(|e| {
                    DomainError::store_unavailable(format!("Failed to delete keys: {}", e))
                })?;
                total_deleted += deleted as usize;
            }

            cursor = new_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(total_deleted)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let result: Option<String> = conn.get(&prefixed_key).await.map_err(|e| {
            DomainError::store_unavailable(format!("Failed to get key '{}': {}", key, e))
        })?;

        Ok(result)
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let result: redis::RedisResult<()> = match ttl {
            Some(ttl) => {
                conn.set_ex(&prefixed_key, value, ttl.as_secs().max(1))
                    .await
            }
            None => conn.set(&prefixed_key, value).await,
        };

        result.map_err(|e| {
            DomainError::store_unavailable(format!("Failed to set key '{}': {}", key, e))
        })
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let deleted: i64 = conn.del(&prefixed_key).await.map_err(|e| {
            DomainError::store_unavailable(format!("Failed to delete key '{}': {}", key, e))
        })?;

        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let exists: bool = conn.exists(&prefixed_key).await.map_err(|e| {
            DomainError::store_unavailable(format!(
                "Failed to check existence of key '{}': {}",
                key, e
            ))
        })?;

        Ok(exists)
    }

    async fn increment(&self, key: &str, by: i64) -> Result<i64, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let new_value: i64 = conn.incr(&prefixed_key, by).await.map_err(|e| {
            DomainError::store_unavailable(format!("Failed to increment key '{}': {}", key, e))
        })?;

        Ok(new_value)
    }

    async fn decrement(&self, key: &str, by: i64) -> Result<i64, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let new_value: i64 = self
            .decrement_script
            .key(&prefixed_key)
            .arg(by)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::store_unavailable(format!("Failed to decrement key '{}': {}", key, e))
            })?;

        Ok(new_value)
    }

    async fn flush(&self) -> Result<(), DomainError> {
        // With a namespace only our keys go; without one the whole database is ours
        match &self.config.namespace {
            Some(prefix) => {
                self.delete_namespace(prefix).await?;
            }
            None => {
                let mut conn = self.connection.clone();
                redis::cmd("FLUSHDB")
                    .query_async::<()>(&mut conn)
                    .await
                    .map_err(|e| {
                        DomainError::store_unavailable(format!("Failed to flush database: {}", e))
                    })?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl WindowCounter for RedisStore {
    async fn hit(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<WindowHit, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let (allowed, count, ttl): (i64, i64, i64) = self
            .window_script
            .key(&prefixed_key)
            .arg(limit)
            .arg(window.as_secs().max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::store_unavailable(format!(
                    "Failed to count hit for key '{}': {}",
                    key, e
                ))
            })?;

        Ok(WindowHit {
            allowed: allowed == 1,
            count: count.max(0) as u64,
            // TTL is -1/-2 when the key has no expiry or is gone
            resets_in: (ttl >= 0).then(|| Duration::from_secs(ttl as u64)),
        })
    }
}
