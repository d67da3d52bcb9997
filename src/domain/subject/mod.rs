//! Subject domain - cached view of an authenticated identity

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::token::TokenClaims;
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Short-lived snapshot of a verified subject, kept under `user:<subject_id>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSnapshot {
    pub subject_id: String,
    pub email: String,
    pub roles: Vec<String>,
    pub is_active: bool,
    /// When the snapshot was taken (epoch seconds)
    pub cached_at: i64,
}

impl SubjectSnapshot {
    pub fn new(
        subject_id: impl Into<String>,
        email: impl Into<String>,
        roles: Vec<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            email: email.into(),
            roles,
            is_active: true,
            cached_at: Utc::now().timestamp(),
        }
    }

    /// Snapshot built from the claims of a verified token
    pub fn from_claims(claims: &TokenClaims) -> Self {
        Self::new(
            claims.subject_id.clone(),
            claims.email.clone(),
            claims.roles.clone(),
        )
    }

    pub fn deactivated(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// Source of truth for subjects, consulted when no snapshot is cached
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SubjectDirectory: Send + Sync {
    /// Looks up the subject named by verified claims
    async fn find_subject(
        &self,
        claims: &TokenClaims,
    ) -> Result<Option<SubjectSnapshot>, DomainError>;
}
