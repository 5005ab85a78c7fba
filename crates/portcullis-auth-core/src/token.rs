//! Bearer token signing and verification
//!
//! Tokens are compact HS256 JWTs encoded with `jsonwebtoken`, so any
//! standard JWT library configured with the same secret accepts them.
//!
//! Security features:
//! - Only `alg: HS256` is accepted; `none` and asymmetric algorithms are rejected
//! - Expiry is read from the injected clock, so `exp <= now` is always enforced

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::crypto::{HmacKey, HmacKeyError};

/// Claim names owned by the issuer; caller extras never override them
const RESERVED_CLAIMS: &[&str] = &[
    "userId",
    "sessionId",
    "permissions",
    "email",
    "name",
    "roles",
    "iat",
    "exp",
];

/// Token errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Malformed, wrong algorithm, or bad signature
    #[error("invalid token")]
    InvalidToken,

    /// Signature valid but `exp` has passed
    #[error("token expired")]
    ExpiredToken,

    /// Claims could not be encoded
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Claims carried by an issued token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "sessionId", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issued at (seconds since epoch)
    #[serde(default)]
    pub iat: i64,
    /// Expiration (seconds since epoch)
    #[serde(default)]
    pub exp: i64,
    /// Additional caller-supplied claims
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenClaims {
    /// Claims for a user with no session binding yet
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: None,
            permissions: Vec::new(),
            email: None,
            name: None,
            roles: Vec::new(),
            iat: 0,
            exp: 0,
            extra: serde_json::Map::new(),
        }
    }

    /// Bind the claims to a session
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set granted permissions
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Set roles
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Set email and display name
    pub fn with_profile(mut self, email: Option<String>, name: Option<String>) -> Self {
        self.email = email;
        self.name = name;
        self
    }

    /// Attach an extra claim
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Token capability injected into the coordinator
pub trait TokenIssuer: Send + Sync {
    /// Sign claims, stamping `iat = now` and `exp = now + ttl`
    fn sign(&self, claims: &TokenClaims, ttl: Duration) -> Result<String, TokenError>;

    /// Verify signature and expiry, returning the decoded claims
    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError>;
}

/// HS256 issuer holding a validated secret
#[derive(Clone)]
pub struct HmacTokenIssuer {
    key: HmacKey,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
}

impl HmacTokenIssuer {
    /// Create an issuer from a secret of at least 32 bytes
    pub fn new(secret: impl AsRef<[u8]>, clock: Arc<dyn Clock>) -> Result<Self, HmacKeyError> {
        let secret = secret.as_ref();
        let key = HmacKey::new(secret)?;

        // Expiry is checked against the injected clock, not the system time
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Ok(Self {
            key,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            clock,
        })
    }
}

/// Whole seconds, rounded up so a sub-second TTL never yields `exp == iat`
fn ttl_seconds(ttl: Duration) -> i64 {
    let secs = ttl.as_secs().saturating_add(u64::from(ttl.subsec_nanos() > 0));
    i64::try_from(secs).unwrap_or(i64::MAX)
}

impl TokenIssuer for HmacTokenIssuer {
    fn sign(&self, claims: &TokenClaims, ttl: Duration) -> Result<String, TokenError> {
        let now = self.clock.now().timestamp();

        let mut stamped = claims.clone();
        stamped.iat = now;
        stamped.exp = now.saturating_add(ttl_seconds(ttl));
        stamped
            .extra
            .retain(|k, _| !RESERVED_CLAIMS.contains(&k.as_str()));

        encode(&Header::new(Algorithm::HS256), &stamped, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!("Token validation failed: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::ExpiredToken,
                _ => TokenError::InvalidToken,
            }
        })?;

        let claims = data.claims;
        if claims.exp <= self.clock.now().timestamp() {
            return Err(TokenError::ExpiredToken);
        }

        Ok(claims)
    }
}

impl std::fmt::Debug for HmacTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacTokenIssuer")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
