//! Health check endpoint

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::api::types::Json;
use crate::infrastructure::cache::StoreBackend;

use super::state::AppState;

/// Health response with the active store
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub store: StoreBackend,
}

/// Health check status
#[derive(Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Returns 200 while the service runs; a file-store fallback reports degraded
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let status = match state.store_backend {
        StoreBackend::Remote => HealthStatus::Healthy,
        StoreBackend::Local => HealthStatus::Degraded,
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.store_backend,
    };

    (StatusCode::OK, Json(response))
}
