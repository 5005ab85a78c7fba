//! Error codes and the structured error shape carried by results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error taxonomy shared with callers.
///
/// The controller layer maps these to transport status codes; the engine
/// itself never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    AuthMethodRequired,
    #[serde(rename = "InvalidAPIKeyFormat")]
    InvalidApiKeyFormat,
    #[serde(rename = "InvalidAPIKey")]
    InvalidApiKey,
    InvalidOrExpiredToken,
    InvalidOAuth2Credentials,
    MissingOAuth2Config,
    SessionNotFound,
    SessionRefreshFailed,
    SessionDestroyFailed,
    HashingFailed,
    InvalidCredentials,
    WeakPassword,
    InternalError,
}

impl ErrorCode {
    /// Wire spelling of the code
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AuthMethodRequired => "AuthMethodRequired",
            Self::InvalidApiKeyFormat => "InvalidAPIKeyFormat",
            Self::InvalidApiKey => "InvalidAPIKey",
            Self::InvalidOrExpiredToken => "InvalidOrExpiredToken",
            Self::InvalidOAuth2Credentials => "InvalidOAuth2Credentials",
            Self::MissingOAuth2Config => "MissingOAuth2Config",
            Self::SessionNotFound => "SessionNotFound",
            Self::SessionRefreshFailed => "SessionRefreshFailed",
            Self::SessionDestroyFailed => "SessionDestroyFailed",
            Self::HashingFailed => "HashingFailed",
            Self::InvalidCredentials => "InvalidCredentials",
            Self::WeakPassword => "WeakPassword",
            Self::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error attached to a failed [`AuthResult`](crate::AuthResult)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthErrorInfo {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable, normalized message
    pub message: String,
    /// When the error was produced
    pub timestamp: DateTime<Utc>,
    /// Whether retrying the same request may succeed
    pub recoverable: bool,
    /// Correlation ID of the request
    pub correlation_id: String,
}
