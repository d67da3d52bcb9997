//! Per-client rate limiting middleware

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};

use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::cache::key_digest;
use crate::infrastructure::rate_limit::RateLimitDecision;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Identifies the caller for rate limiting
///
/// Bearer callers are keyed by a digest of their Authorization header,
/// everyone else by address: forwarded-for, then real-ip, then the peer.
pub fn derive_client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with("Bearer "))
    {
        return format!("user:{}", key_digest(auth));
    }

    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get(X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, real_ip, peer) {
        (Some(ip), _, _) | (None, Some(ip), _) => format!("ip:{}", ip),
        (None, None, Some(addr)) => format!("ip:{}", addr.ip()),
        (None, None, None) => "unknown".to_string(),
    }
}

/// Counts the request and stamps the rate-limit headers on the response
///
/// A failing store lets the request through without headers.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_key = derive_client_key(request.headers(), peer);

    let decision = match state.rate_limiter.check_and_increment(&client_key).await {
        Ok(decision) => decision,
        Err(e) => {
            warn!(error = %e, client_key = %client_key, "Rate limit check failed, allowing request");
            return next.run(request).await;
        }
    };

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        debug!(client_key = %client_key, count = decision.current_count, "Request rate limited");
        ApiError::rate_limited(decision.retry_after).into_response()
    };

    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining()));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at));
}
