//! Verified-subject resolution backed by the shared store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::cache::{user_snapshot_key, KeyValueStore, KeyValueStoreExt};
use crate::domain::subject::{SubjectDirectory, SubjectSnapshot};
use crate::domain::token::{TokenClaims, TokenService};
use crate::domain::DomainError;

/// Configuration for subject snapshot caching
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubjectCacheConfig {
    /// Lifetime of a cached snapshot in seconds
    pub ttl_secs: u64,
}

impl Default for SubjectCacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

impl SubjectCacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Directory that trusts verified claims as the subject record
#[derive(Debug, Default, Clone)]
pub struct ClaimsSubjectDirectory;

#[async_trait]
impl SubjectDirectory for ClaimsSubjectDirectory {
    async fn find_subject(
        &self,
        claims: &TokenClaims,
    ) -> Result<Option<SubjectSnapshot>, DomainError> {
        Ok(Some(SubjectSnapshot::from_claims(claims)))
    }
}

/// Resolves bearer tokens to subject snapshots, caching them under `user:<id>`
pub struct SubjectService {
    tokens: Arc<dyn TokenService>,
    store: Arc<dyn KeyValueStore>,
    directory: Arc<dyn SubjectDirectory>,
    config: SubjectCacheConfig,
}

impl std::fmt::Debug for SubjectService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubjectService")
            .field("tokens", &self.tokens)
            .field("store", &self.store)
            .field("config", &self.config)
            .finish()
    }
}

impl SubjectService {
    /// Creates a service that builds snapshots from token claims
    pub fn new(tokens: Arc<dyn TokenService>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_directory(tokens, store, Arc::new(ClaimsSubjectDirectory))
    }

    /// Creates a service consulting the given directory on cache misses
    pub fn with_directory(
        tokens: Arc<dyn TokenService>,
        store: Arc<dyn KeyValueStore>,
        directory: Arc<dyn SubjectDirectory>,
    ) -> Self {
        Self {
            tokens,
            store,
            directory,
            config: SubjectCacheConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SubjectCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Caches a snapshot, replacing whatever the directory would return until it expires
    pub async fn remember(&self, snapshot: &SubjectSnapshot) -> Result<(), DomainError> {
        let key = user_snapshot_key(&snapshot.subject_id);
        self.store.set(&key, snapshot, Some(self.config.ttl())).await
    }

    /// Snapshot for a bearer token
    ///
    /// Returns `None` when the token fails verification or the directory does
    /// not know the subject. Store failures are returned as errors.
    pub async fn resolve(&self, token: &str) -> Result<Option<SubjectSnapshot>, DomainError> {
        let claims = match self.tokens.verify(token) {
            Ok(claims) => claims,
            Err(e) if !e.is_token_error() => return Err(e),
            Err(e) => {
                debug!(error = %e, "Rejected bearer token");
                return Ok(None);
            }
        };

        let key = user_snapshot_key(&claims.subject_id);
        let directory = &self.directory;
        let claims_ref = &claims;

        let result = self
            .store
            .compute_if_absent(
                &key,
                || async move {
                    directory
                        .find_subject(claims_ref)
                        .await?
                        .ok_or_else(|| DomainError::not_found("Unknown subject"))
                },
                Some(self.config.ttl()),
            )
            .await;

        match result {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(DomainError::NotFound { .. }) => {
                debug!(subject_id = %claims.subject_id, "Subject not in directory");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
