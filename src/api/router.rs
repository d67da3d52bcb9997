use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::auth;
use super::health;
use super::middleware::rate_limit_middleware;
use super::state::AppState;
use super::types::ApiError;

/// Create the full router with application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", create_api_router())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/v1/auth", auth::create_auth_router())
        .fallback(not_found)
}

async fn not_found() -> ApiError {
    ApiError::not_found("The requested resource was not found").with_code()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::domain::cache::MockStore;
    use crate::domain::subject::SubjectSnapshot;
    use crate::domain::token::{SubjectClaims, TokenService};
    use crate::infrastructure::auth::{TokenConfig, TokenManager};
    use crate::infrastructure::cache::StoreBackend;
    use crate::infrastructure::rate_limit::{RateLimitConfig, RateLimiter};
    use crate::infrastructure::services::SubjectService;

    struct TestApp {
        tokens: Arc<TokenManager>,
        subjects: Arc<SubjectService>,
        router: Router,
    }

    fn test_app_with_store(store: MockStore, max_requests: u64) -> TestApp {
        let tokens = Arc::new(TokenManager::new(TokenConfig::new("router-test-secret")).unwrap());
        let store = Arc::new(store);

        let limiter = RateLimiter::new(
            store.clone(),
            store.clone(),
            RateLimitConfig::new(max_requests, 60),
        );
        let subjects = SubjectService::new(tokens.clone(), store);
        let state = AppState::new(tokens.clone(), limiter, subjects, StoreBackend::Local);

        TestApp {
            tokens,
            subjects: state.subjects.clone(),
            router: create_router(state),
        }
    }

    fn test_app(max_requests: u64) -> TestApp {
        test_app_with_store(MockStore::new(), max_requests)
    }

    fn subject() -> SubjectClaims {
        SubjectClaims::new("42", "ada@example.com").with_roles(["user"])
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_store() {
        let app = test_app(10);

        let response = app.router.oneshot(get("/health", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "10");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "9");

        let body = body_json(response).await;
        assert_eq!(body["store"], "local");
        assert_eq!(body["status"], "degraded");
    }

    #[tokio::test]
    async fn test_me_requires_token() {
        let app = test_app(10);

        let response = app
            .router
            .oneshot(get("/api/v1/auth/me", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["x-ratelimit-limit"], "10");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "9");

        let body = body_json(response).await;
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_me_with_valid_token() {
        let app = test_app(10);
        let token = app.tokens.issue_access(&subject()).unwrap();

        let response = app
            .router
            .oneshot(get("/api/v1/auth/me", Some(&token)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["subject_id"], "42");
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(body["roles"], json!(["user"]));
        assert_eq!(body["is_active"], true);
    }

    #[tokio::test]
    async fn test_me_with_tampered_token() {
        let app = test_app(10);
        let token = app.tokens.issue_access(&subject()).unwrap();
        let (unsigned, signature) = token.rsplit_once('.').unwrap();
        let flipped = if signature.starts_with('A') { "B" } else { "A" };
        let tampered = format!("{}.{}{}", unsigned, flipped, &signature[1..]);

        let response = app
            .router
            .oneshot(get("/api/v1/auth/me", Some(&tampered)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "Invalid token signature");
    }

    #[tokio::test]
    async fn test_me_with_deactivated_subject() {
        let app = test_app(10);
        let token = app.tokens.issue_access(&subject()).unwrap();
        app.subjects
            .remember(&SubjectSnapshot::new("42", "ada@example.com", vec![]).deactivated())
            .await
            .unwrap();

        let response = app
            .router
            .oneshot(get("/api/v1/auth/me", Some(&token)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "Account is deactivated");
    }

    #[tokio::test]
    async fn test_me_with_refresh_token_is_rejected() {
        let app = test_app(10);
        let refresh_token = app.tokens.issue_refresh(&subject()).unwrap();

        let response = app
            .router
            .oneshot(get("/api/v1/auth/me", Some(&refresh_token)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "Access token required");
    }

    #[tokio::test]
    async fn test_refresh_returns_new_pair() {
        let app = test_app(10);
        let refresh_token = app.tokens.issue_refresh(&subject()).unwrap();

        let response = app
            .router
            .oneshot(post_json(
                "/api/v1/auth/refresh",
                json!({ "refresh_token": refresh_token }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["expires_in"], 3600);

        let access = app
            .tokens
            .verify(body["access_token"].as_str().unwrap())
            .unwrap();
        assert_eq!(access.subject_id, "42");
        assert!(!access.is_refresh());
    }

    #[tokio::test]
    async fn test_refresh_with_access_token_is_rejected() {
        let app = test_app(10);
        let access_token = app.tokens.issue_access(&subject()).unwrap();

        let response = app
            .router
            .oneshot(post_json(
                "/api/v1/auth/refresh",
                json!({ "refresh_token": access_token }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["message"], "Invalid refresh token");
    }

    #[tokio::test]
    async fn test_logout_is_stateless() {
        let app = test_app(10);
        let token = app.tokens.issue_access(&subject()).unwrap();

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/auth/logout")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Token still works afterwards
        let response = app
            .router
            .oneshot(get("/api/v1/auth/me", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_with_contract() {
        let app = test_app(2);

        let request = || {
            Request::builder()
                .uri("/api/v1/auth/me")
                .header("x-forwarded-for", "203.0.113.7")
                .body(Body::empty())
                .unwrap()
        };

        for remaining in ["1", "0"] {
            let response = app.router.clone().oneshot(request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
        }

        let before = Utc::now().timestamp();
        let response = app.router.clone().oneshot(request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
        assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

        let reset: i64 = response.headers()["x-ratelimit-reset"]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(reset >= before && reset <= before + 61);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Rate Limit Exceeded");
        assert_eq!(body["message"], "Too many requests. Please try again later.");
        assert_eq!(body["retry_after"], 60);

        // Other clients are unaffected
        let response = app
            .router
            .oneshot(get("/api/v1/auth/me", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_store_failure_fails_open() {
        let app = test_app_with_store(MockStore::new().with_error("redis down"), 1);

        let response = app
            .router
            .oneshot(get("/api/v1/auth/me", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }

    #[tokio::test]
    async fn test_store_failure_on_protected_route() {
        let app = test_app_with_store(MockStore::new().with_error("redis down"), 1);
        let token = app.tokens.issue_access(&subject()).unwrap();

        let response = app
            .router
            .oneshot(get("/api/v1/auth/me", Some(&token)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_every_route_is_rate_limited() {
        let app = test_app(1);

        let response = app.router.clone().oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "1");

        let response = app.router.clone().oneshot(get("/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let app = test_app(5);
        let response = app.router.oneshot(get("/nope", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-ratelimit-remaining"], "4");
        assert_eq!(body_json(response).await["code"], 404);
    }

    #[tokio::test]
    async fn test_unknown_api_path() {
        let app = test_app(10);

        let response = app
            .router
            .oneshot(get("/api/v1/nothing-here", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get("x-ratelimit-limit").is_some());

        let body = body_json(response).await;
        assert_eq!(body["error"], "Not Found");
        assert_eq!(body["code"], 404);
    }
}
