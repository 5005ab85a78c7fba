//! Authentication types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuthErrorInfo, SecurityLevel, SessionId, UserInfo};

/// Authentication method (trust tier)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthMethod {
    /// Prefixed API key
    #[serde(rename = "api-key")]
    ApiKey,
    /// Signed bearer token
    #[serde(rename = "jwt")]
    Jwt,
    /// OAuth2 client credentials
    #[serde(rename = "oauth2")]
    OAuth2,
    /// Email and password
    #[serde(rename = "password")]
    Password,
}

impl AuthMethod {
    /// Wire spelling of the method
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "api-key",
            Self::Jwt => "jwt",
            Self::OAuth2 => "oauth2",
            Self::Password => "password",
        }
    }

    /// Security level reached when this tier succeeds
    pub const fn security_level(&self) -> SecurityLevel {
        match self {
            Self::Password => SecurityLevel::Basic,
            Self::ApiKey => SecurityLevel::Standard,
            Self::Jwt => SecurityLevel::High,
            Self::OAuth2 => SecurityLevel::Enterprise,
        }
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthMethod {
    type Err = AuthMethodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "api-key" | "api_key" | "apikey" => Ok(Self::ApiKey),
            "jwt" | "bearer" => Ok(Self::Jwt),
            "oauth2" | "oauth" => Ok(Self::OAuth2),
            "password" => Ok(Self::Password),
            _ => Err(AuthMethodParseError(s.to_string())),
        }
    }
}

/// Error parsing an authentication method string
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown authentication method: {0}")]
pub struct AuthMethodParseError(pub String);

/// Record of one tier attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStep {
    /// 1-based position in the chain
    pub step: u32,
    /// Tier attempted
    pub method: AuthMethod,
    /// Wall-clock duration of the attempt
    pub duration_ms: u64,
    /// Whether the tier accepted the credentials
    pub success: bool,
    /// Permissions granted by this tier (empty on failure)
    pub permissions: Vec<String>,
    /// Level this tier grants
    pub security_level: SecurityLevel,
    /// Correlation ID of the request
    pub correlation_id: String,
}

/// Uniform outcome of every public engine operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResult {
    /// Whether the operation succeeded
    pub success: bool,
    /// Session established or looked up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Signed bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Session expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Effective permissions
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Authenticated identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    /// Tier attempts in execution order
    #[serde(default)]
    pub steps: Vec<AuthStep>,
    /// Wall-clock span of the whole operation
    pub total_duration_ms: u64,
    /// Highest level reached
    pub security_level: SecurityLevel,
    /// Failure details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AuthErrorInfo>,
    /// Correlation ID of the request
    pub correlation_id: String,
}

impl AuthResult {
    /// Failed result carrying the steps executed so far
    pub fn failure(
        error: AuthErrorInfo,
        steps: Vec<AuthStep>,
        total_duration_ms: u64,
        security_level: SecurityLevel,
    ) -> Self {
        Self {
            success: false,
            session_id: None,
            token: None,
            expires_at: None,
            permissions: Vec::new(),
            user: None,
            steps,
            total_duration_ms,
            security_level,
            correlation_id: error.correlation_id.clone(),
            error: Some(error),
        }
    }

    /// Error code of a failed result
    pub fn error_code(&self) -> Option<crate::ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }

    /// Check for an effective permission
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission || p == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    #[test]
    fn test_method_wire_names() {
        assert_eq!(
            serde_json::to_string(&AuthMethod::ApiKey).unwrap(),
            "\"api-key\""
        );
        assert_eq!("api-key".parse::<AuthMethod>().unwrap(), AuthMethod::ApiKey);
        assert_eq!("OAuth2".parse::<AuthMethod>().unwrap(), AuthMethod::OAuth2);
        assert!("kerberos".parse::<AuthMethod>().is_err());
    }

    #[test]
    fn test_method_levels() {
        assert_eq!(AuthMethod::ApiKey.security_level(), SecurityLevel::Standard);
        assert_eq!(AuthMethod::Jwt.security_level(), SecurityLevel::High);
        assert_eq!(AuthMethod::OAuth2.security_level(), SecurityLevel::Enterprise);
    }

    #[test]
    fn test_failure_copies_correlation_id() {
        let error = AuthErrorInfo {
            code: ErrorCode::InvalidApiKey,
            message: "invalid API key".to_string(),
            timestamp: Utc::now(),
            recoverable: false,
            correlation_id: "corr-1".to_string(),
        };
        let result = AuthResult::failure(error, Vec::new(), 3, SecurityLevel::Basic);

        assert!(!result.success);
        assert_eq!(result.correlation_id, "corr-1");
        assert_eq!(result.error_code(), Some(ErrorCode::InvalidApiKey));
    }
}
