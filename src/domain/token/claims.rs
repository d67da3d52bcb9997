//! Signed token payloads

use serde::{Deserialize, Serialize};

/// Kind of a signed token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// Caller-supplied identity placed in every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectClaims {
    pub subject_id: String,
    pub email: String,
    pub roles: Vec<String>,
}

impl SubjectClaims {
    pub fn new(subject_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            email: email.into(),
            roles: Vec::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }
}

/// Claims carried by a signed token
///
/// Serialized flat, using the registered JWT names where one exists.
/// Immutable once signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "sub")]
    pub subject_id: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    #[serde(rename = "iss")]
    pub issuer: String,
    #[serde(rename = "jti")]
    pub token_id: String,
    /// Only refresh tokens carry this field
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_kind: Option<TokenKind>,
}

impl TokenClaims {
    /// Effective kind: a missing `type` means access
    pub fn kind(&self) -> TokenKind {
        self.token_kind.unwrap_or(TokenKind::Access)
    }

    pub fn is_refresh(&self) -> bool {
        self.kind() == TokenKind::Refresh
    }

    /// The identity part, without the fields filled in at issuance
    pub fn subject(&self) -> SubjectClaims {
        SubjectClaims {
            subject_id: self.subject_id.clone(),
            email: self.email.clone(),
            roles: self.roles.clone(),
        }
    }
}

/// Fresh access/refresh pair handed back on renewal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

impl TokenPair {
    pub fn bearer(access_token: String, refresh_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}
