//! Application state for shared services

use std::sync::Arc;

use crate::domain::token::TokenService;
use crate::infrastructure::cache::StoreBackend;
use crate::infrastructure::rate_limit::RateLimiter;
use crate::infrastructure::services::SubjectService;

/// Application state containing shared services using dynamic dispatch
#[derive(Debug, Clone)]
pub struct AppState {
    pub tokens: Arc<dyn TokenService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub subjects: Arc<SubjectService>,
    /// Store picked at startup
    pub store_backend: StoreBackend,
}

impl AppState {
    pub fn new(
        tokens: Arc<dyn TokenService>,
        rate_limiter: RateLimiter,
        subjects: SubjectService,
        store_backend: StoreBackend,
    ) -> Self {
        Self {
            tokens,
            rate_limiter: Arc::new(rate_limiter),
            subjects: Arc::new(subjects),
            store_backend,
        }
    }
}
