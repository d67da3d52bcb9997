//! Infrastructure layer - Store backends, token signing and services

pub mod auth;
pub mod cache;
pub mod logging;
pub mod rate_limit;
pub mod services;
