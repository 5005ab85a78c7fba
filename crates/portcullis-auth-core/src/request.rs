//! Authentication requests
//!
//! Each tier carries its own credential shape; [`AuthCredentials`] tags them
//! so the coordinator can dispatch without stringly-typed options.

use std::time::Duration;

use portcullis_types::AuthMethod;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AuthError;

/// API key credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyConfig {
    #[serde(default)]
    pub api_key: String,
    /// Requested permissions; the policy default applies when empty
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl ApiKeyConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            permissions: Vec::new(),
        }
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }
}

/// Bearer token credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtConfig {
    #[serde(default)]
    pub token: String,
}

impl JwtConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

/// OAuth2 client credentials
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Config {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl OAuth2Config {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            provider: provider.into(),
            scopes: Vec::new(),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

impl std::fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("provider", &self.provider)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Credentials for exactly one tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCredentials {
    ApiKey(ApiKeyConfig),
    Jwt(JwtConfig),
    OAuth2(OAuth2Config),
}

impl AuthCredentials {
    pub fn method(&self) -> AuthMethod {
        match self {
            Self::ApiKey(_) => AuthMethod::ApiKey,
            Self::Jwt(_) => AuthMethod::Jwt,
            Self::OAuth2(_) => AuthMethod::OAuth2,
        }
    }
}

/// Per-request settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Threaded into every step and error; generated when absent
    pub correlation_id: Option<String>,
    /// Deadline for external lookups; the configured default when absent
    pub timeout: Option<Duration>,
}

impl RequestContext {
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A single-method authentication request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub credentials: AuthCredentials,
    pub context: RequestContext,
}

impl AuthRequest {
    pub fn new(credentials: AuthCredentials) -> Self {
        Self {
            credentials,
            context: RequestContext::default(),
        }
    }

    pub fn api_key(config: ApiKeyConfig) -> Self {
        Self::new(AuthCredentials::ApiKey(config))
    }

    pub fn jwt(token: impl Into<String>) -> Self {
        Self::new(AuthCredentials::Jwt(JwtConfig::new(token)))
    }

    pub fn oauth2(config: OAuth2Config) -> Self {
        Self::new(AuthCredentials::OAuth2(config))
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Parse the loose JSON request shape
    ///
    /// ```json
    /// {"method": "api-key", "apiKey": "agentui_...", "permissions": ["basic"], "correlationId": "c-1"}
    /// ```
    ///
    /// A missing or unknown `method` is `AuthMethodRequired`. A credential
    /// field that is missing or of the wrong type is left empty, so the tier
    /// reports its own format error. The correlation id is kept in the
    /// context even when parsing fails.
    pub fn from_json(value: &Value) -> (RequestContext, Result<Self, AuthError>) {
        let context = RequestContext {
            correlation_id: value
                .get("correlationId")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(String::from),
            timeout: value
                .get("timeoutMs")
                .and_then(Value::as_u64)
                .map(Duration::from_millis),
        };

        let method = value
            .get("method")
            .and_then(Value::as_str)
            .and_then(|m| m.parse::<AuthMethod>().ok());

        let credentials = match method {
            Some(AuthMethod::ApiKey) => AuthCredentials::ApiKey(ApiKeyConfig {
                api_key: string_field(value, "apiKey"),
                permissions: string_list(value, "permissions"),
            }),
            Some(AuthMethod::Jwt) => AuthCredentials::Jwt(JwtConfig {
                token: string_field(value, "token"),
            }),
            Some(AuthMethod::OAuth2) => AuthCredentials::OAuth2(
                value
                    .get("oauth2")
                    .and_then(|nested| serde_json::from_value::<OAuth2Config>(nested.clone()).ok())
                    .unwrap_or_else(|| OAuth2Config {
                        client_id: string_field(value, "clientId"),
                        client_secret: string_field(value, "clientSecret"),
                        redirect_uri: string_field(value, "redirectUri"),
                        provider: string_field(value, "provider"),
                        scopes: string_list(value, "scopes"),
                    }),
            ),
            // Password logins go through authenticate_password
            Some(AuthMethod::Password) | None => {
                return (context, Err(AuthError::AuthMethodRequired));
            }
        };

        let request = Self {
            credentials,
            context: context.clone(),
        };
        (context, Ok(request))
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
