//! Authentication infrastructure module
//!
//! This module provides signed token management for bearer authentication.

mod jwt;

pub use jwt::{TokenConfig, TokenManager};
