//! Signed token issuance and verification

use std::fmt::Debug;
use std::str::FromStr;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::Deserialize;
use tracing::debug;

use crate::domain::token::{SubjectClaims, TokenClaims, TokenKind, TokenService};
use crate::domain::DomainError;

/// Configuration for the token manager
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC secret; required
    pub secret: Option<String>,
    /// One of HS256, HS384, HS512
    pub algorithm: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    pub issuer: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: None,
            algorithm: "HS256".to_string(),
            access_ttl_secs: 3600,
            refresh_ttl_secs: 86400,
            issuer: "localhost".to_string(),
        }
    }
}

impl TokenConfig {
    /// Create a configuration with the given secret and default lifetimes
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            ..Default::default()
        }
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn with_lifetimes(mut self, access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        self.access_ttl_secs = access_ttl_secs;
        self.refresh_ttl_secs = refresh_ttl_secs;
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }
}

/// HMAC-signed bearer token manager
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("algorithm", &self.algorithm)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("issuer", &self.issuer)
            .field("encoding_key", &"[hidden]")
            .field("decoding_key", &"[hidden]")
            .finish()
    }
}

impl TokenManager {
    /// Build a manager, rejecting configurations that could never issue a valid token
    pub fn new(config: TokenConfig) -> Result<Self, DomainError> {
        let secret = config
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DomainError::misconfigured("auth.secret must be set"))?;

        let algorithm = parse_hmac_algorithm(&config.algorithm)?;

        if config.access_ttl_secs == 0 || config.refresh_ttl_secs == 0 {
            return Err(DomainError::misconfigured(
                "Token lifetimes must be at least one second",
            ));
        }

        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_aud = false;

        Ok(Self {
            algorithm,
            access_ttl_secs: config.access_ttl_secs,
            refresh_ttl_secs: config.refresh_ttl_secs,
            issuer: config.issuer,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    fn claims_for(&self, subject: &SubjectClaims, kind: TokenKind) -> TokenClaims {
        let now = Utc::now().timestamp();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };

        TokenClaims {
            subject_id: subject.subject_id.clone(),
            email: subject.email.clone(),
            roles: subject.roles.clone(),
            issued_at: now,
            expires_at: now + ttl as i64,
            issuer: self.issuer.clone(),
            token_id: new_token_id(),
            token_kind: match kind {
                TokenKind::Access => None,
                TokenKind::Refresh => Some(TokenKind::Refresh),
            },
        }
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, DomainError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| DomainError::internal(format!("Failed to sign token: {}", e)))
    }
}

impl TokenService for TokenManager {
    fn issue_access(&self, subject: &SubjectClaims) -> Result<String, DomainError> {
        let claims = self.claims_for(subject, TokenKind::Access);
        debug!(subject_id = %claims.subject_id, jti = %claims.token_id, "Issuing access token");
        self.sign(&claims)
    }

    fn issue_refresh(&self, subject: &SubjectClaims) -> Result<String, DomainError> {
        let claims = self.claims_for(subject, TokenKind::Refresh);
        debug!(subject_id = %claims.subject_id, jti = %claims.token_id, "Issuing refresh token");
        self.sign(&claims)
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, DomainError> {
        let token_data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }
}

fn parse_hmac_algorithm(name: &str) -> Result<Algorithm, DomainError> {
    match Algorithm::from_str(name) {
        Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Ok(alg),
        Ok(other) => Err(DomainError::misconfigured(format!(
            "Unsupported signing algorithm: {:?}. Use HS256, HS384 or HS512",
            other
        ))),
        Err(_) => Err(DomainError::misconfigured(format!(
            "Unknown signing algorithm: {}",
            name
        ))),
    }
}

/// 16 random bytes as 32 lowercase hex chars
fn new_token_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
