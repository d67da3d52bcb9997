//! Token domain - claims and the token service contract

mod claims;
mod service;

pub use claims::{SubjectClaims, TokenClaims, TokenKind, TokenPair};
pub use service::TokenService;
