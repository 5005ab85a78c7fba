//! Auth errors

use chrono::{DateTime, Utc};
use portcullis_types::{AuthErrorInfo, ErrorCode};
use thiserror::Error;

use crate::token::TokenError;

/// Errors surfaced at the engine's public boundary.
///
/// Messages are normalized: collaborator and library error text is logged
/// where it is caught and never carried in these variants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Request named no (or an unknown) authentication method
    #[error("authentication method is required")]
    AuthMethodRequired,

    /// API key failed the prefix/length check
    #[error("invalid API key format")]
    InvalidApiKeyFormat,

    /// API key was well formed but rejected by the lookup
    #[error("invalid API key")]
    InvalidApiKey,

    /// Bearer token was malformed, forged or expired
    #[error("{}", if *expired { "token expired" } else { "invalid token" })]
    InvalidOrExpiredToken { expired: bool },

    /// OAuth2 client credentials rejected by the provider verifier
    #[error("invalid OAuth2 credentials")]
    InvalidOAuth2Credentials,

    /// OAuth2 request is missing a required field
    #[error("missing OAuth2 configuration: {0}")]
    MissingOAuth2Config(&'static str),

    /// Session absent or expired
    #[error("session not found")]
    SessionNotFound,

    /// Session could not be rotated
    #[error("session refresh failed")]
    SessionRefreshFailed,

    /// Session was not present to destroy
    #[error("session destroy failed")]
    SessionDestroyFailed,

    /// Invalid cost parameters or hashing library fault
    #[error("password hashing failed")]
    HashingFailed,

    /// Unknown user or wrong password (deliberately indistinguishable)
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Password does not meet the strength policy
    #[error("password does not meet strength requirements: {}", feedback.join("; "))]
    WeakPassword { feedback: Vec<String> },

    /// External collaborator timed out or failed; retrying may succeed
    #[error("{message}")]
    Unavailable { code: ErrorCode, message: String },

    /// Unexpected collaborator fault
    #[error("internal error")]
    Internal,
}

impl AuthError {
    /// Recoverable failure from an external collaborator
    pub fn unavailable(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Unavailable {
            code,
            message: message.into(),
        }
    }

    /// Get error code for results
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AuthMethodRequired => ErrorCode::AuthMethodRequired,
            Self::InvalidApiKeyFormat => ErrorCode::InvalidApiKeyFormat,
            Self::InvalidApiKey => ErrorCode::InvalidApiKey,
            Self::InvalidOrExpiredToken { .. } => ErrorCode::InvalidOrExpiredToken,
            Self::InvalidOAuth2Credentials => ErrorCode::InvalidOAuth2Credentials,
            Self::MissingOAuth2Config(_) => ErrorCode::MissingOAuth2Config,
            Self::SessionNotFound => ErrorCode::SessionNotFound,
            Self::SessionRefreshFailed => ErrorCode::SessionRefreshFailed,
            Self::SessionDestroyFailed => ErrorCode::SessionDestroyFailed,
            Self::HashingFailed => ErrorCode::HashingFailed,
            Self::InvalidCredentials => ErrorCode::InvalidCredentials,
            Self::WeakPassword { .. } => ErrorCode::WeakPassword,
            Self::Unavailable { code, .. } => *code,
            Self::Internal => ErrorCode::InternalError,
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Structured form attached to a failed result
    pub fn to_info(&self, correlation_id: &str, timestamp: DateTime<Utc>) -> AuthErrorInfo {
        AuthErrorInfo {
            code: self.code(),
            message: self.to_string(),
            timestamp,
            recoverable: self.is_recoverable(),
            correlation_id: correlation_id.to_string(),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        tracing::debug!("Token rejected: {}", err);
        match err {
            TokenError::ExpiredToken => Self::InvalidOrExpiredToken { expired: true },
            TokenError::InvalidToken => Self::InvalidOrExpiredToken { expired: false },
            TokenError::Signing(_) => Self::Internal,
        }
    }
}
