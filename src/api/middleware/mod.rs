//! API middleware components

pub mod rate_limit;
pub mod user_auth;

pub use rate_limit::{derive_client_key, rate_limit_middleware};
pub use user_auth::{extract_bearer_token, RequireSubject};
