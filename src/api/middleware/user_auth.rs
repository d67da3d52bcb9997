//! Bearer token authentication extractor

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::debug;

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::subject::SubjectSnapshot;

/// Extractor that requires a valid access token for a known, active subject
///
/// Extracts the token from:
/// - Authorization header: `Bearer <token>`
#[derive(Debug, Clone)]
pub struct RequireSubject(pub SubjectSnapshot);

impl FromRequestParts<AppState> for RequireSubject {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;

        debug!("Validating bearer token");

        // Verify up front so the rejection names the failure
        let claims = state.tokens.verify(&token)?;
        if claims.is_refresh() {
            return Err(ApiError::unauthorized("Access token required"));
        }

        let subject = state
            .subjects
            .resolve(&token)
            .await?
            .ok_or_else(|| ApiError::unauthorized("User not found"))?;

        if !subject.is_active {
            return Err(ApiError::unauthorized("Account is deactivated"));
        }

        Ok(RequireSubject(subject))
    }
}

/// Extract the bearer token from the Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| ApiError::bad_request("Invalid Authorization header encoding"))?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }
    }

    Err(ApiError::unauthorized(
        "Authentication required. Provide a token via 'Authorization: Bearer <token>' header",
    ))
}
