//! Token service trait

use std::fmt::Debug;

use crate::domain::DomainError;

use super::{SubjectClaims, TokenClaims, TokenPair};

/// Issues, verifies and renews signed bearer tokens
pub trait TokenService: Send + Sync + Debug {
    /// Issue a short-lived access token for the subject
    fn issue_access(&self, subject: &SubjectClaims) -> Result<String, DomainError>;

    /// Issue a long-lived refresh token for the subject
    fn issue_refresh(&self, subject: &SubjectClaims) -> Result<String, DomainError>;

    /// Check signature, shape and expiry, returning the claims
    fn verify(&self, token: &str) -> Result<TokenClaims, DomainError>;

    /// Exchange a refresh token for a fresh access/refresh pair
    fn renew(&self, refresh_token: &str) -> Result<TokenPair, DomainError> {
        let claims = self.verify(refresh_token)?;

        if !claims.is_refresh() {
            return Err(DomainError::WrongTokenKind);
        }

        let subject = claims.subject();

        Ok(TokenPair::bearer(
            self.issue_access(&subject)?,
            self.issue_refresh(&subject)?,
            self.access_ttl_secs(),
        ))
    }

    /// Subject of a valid token; any verification failure yields `None`
    fn subject_from_token(&self, token: &str) -> Option<String> {
        self.verify(token).ok().map(|claims| claims.subject_id)
    }

    /// Access token lifetime in seconds
    fn access_ttl_secs(&self) -> u64;
}
