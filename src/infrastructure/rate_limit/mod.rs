//! Rate limiting infrastructure
//!
//! Fixed-window request counting shared through the selected store.

mod limiter;

pub use limiter::{RateLimitConfig, RateLimitDecision, RateLimiter};
