//! PMP Auth Gateway
//!
//! Token lifecycle and rate limiting over a shared key/value store:
//! - HMAC-signed access and refresh tokens (issue, verify, renew)
//! - Fixed-window rate limiting per client
//! - Redis store with a file-backed fallback chosen at startup

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use domain::token::TokenService;
use infrastructure::{
    auth::TokenManager,
    cache::StoreSelector,
    rate_limit::RateLimiter,
    services::SubjectService,
};

/// Create application state from configuration
///
/// Fails on an unusable token configuration before touching any store.
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let tokens: Arc<dyn TokenService> = Arc::new(TokenManager::new(config.auth.clone())?);

    let store = StoreSelector::select(&config.store).await?;

    let rate_limiter = RateLimiter::new(
        store.kv.clone(),
        store.counters.clone(),
        config.rate_limit.clone(),
    );
    let subjects = SubjectService::new(tokens.clone(), store.kv.clone())
        .with_config(config.subject_cache.clone());

    Ok(AppState::new(tokens, rate_limiter, subjects, store.backend))
}
