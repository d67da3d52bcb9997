//! Authentication API endpoints
//!
//! Token renewal, logout, and current-subject info.

use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::RequireSubject;
use crate::api::state::AppState;
use crate::api::types::{ApiError, Json};
use crate::domain::subject::SubjectSnapshot;
use crate::domain::token::TokenPair;

/// Create the authentication router
pub fn create_auth_router() -> Router<AppState> {
    Router::new()
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(get_current_subject))
}

/// Refresh request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Exchange a refresh token for a new token pair
///
/// POST /api/v1/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = state.tokens.renew(&request.refresh_token)?;
    debug!("Issued renewed token pair");

    Ok(Json(pair))
}

/// Logout response
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// Logout
///
/// POST /api/v1/auth/logout
///
/// Tokens stay valid until they expire; the client discards them.
pub async fn logout(_subject: RequireSubject) -> Result<Json<LogoutResponse>, ApiError> {
    Ok(Json(LogoutResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// Get the authenticated subject
///
/// GET /api/v1/auth/me
pub async fn get_current_subject(
    RequireSubject(subject): RequireSubject,
) -> Result<Json<SubjectSnapshot>, ApiError> {
    Ok(Json(subject))
}
