//! Configuration types for the auth engine

use std::str::FromStr;
use std::time::Duration;

use portcullis_types::{
    API_KEY_MIN_LENGTH, API_KEY_PREFIX, DEFAULT_API_KEY_PERMISSIONS, DEFAULT_OAUTH2_PERMISSIONS,
};

use crate::crypto::HmacKey;
use crate::password::{Argon2Config, StrengthPolicy};
use crate::session::SessionConfig;

/// API key shape policy and default grants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyPolicy {
    /// Accepted key prefixes
    pub prefixes: Vec<String>,
    /// Minimum total key length
    pub min_length: usize,
    /// Granted when the request names no permissions
    pub default_permissions: Vec<String>,
}

impl Default for ApiKeyPolicy {
    fn default() -> Self {
        Self {
            prefixes: vec![API_KEY_PREFIX.to_string()],
            min_length: API_KEY_MIN_LENGTH,
            default_permissions: to_strings(DEFAULT_API_KEY_PERMISSIONS),
        }
    }
}

/// Auth engine configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for token signing (at least 32 bytes)
    pub token_secret: String,
    /// Lifetime of issued tokens
    pub token_ttl: Duration,
    /// Default deadline for external lookups
    pub lookup_timeout: Duration,
    pub session: SessionConfig,
    pub api_keys: ApiKeyPolicy,
    /// Granted to every accepted OAuth2 client
    pub oauth2_permissions: Vec<String>,
    pub argon2: Argon2Config,
    pub strength: StrengthPolicy,
    /// Concurrent password derivations
    pub hashing_workers: usize,
}

impl AuthConfig {
    /// Create a config with defaults; the secret is checked when the issuer is built
    pub fn new(token_secret: impl Into<String>) -> Self {
        Self {
            token_secret: token_secret.into(),
            token_ttl: Duration::from_secs(60 * 60), // 1 hour
            lookup_timeout: Duration::from_millis(5000),
            session: SessionConfig::default(),
            api_keys: ApiKeyPolicy::default(),
            oauth2_permissions: to_strings(DEFAULT_OAUTH2_PERMISSIONS),
            argon2: Argon2Config::default(),
            strength: StrengthPolicy::default(),
            hashing_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    /// Create a config, rejecting a secret shorter than 32 bytes
    pub fn try_new(token_secret: impl Into<String>) -> Result<Self, ConfigError> {
        let config = Self::new(token_secret);
        if config.token_secret.len() < HmacKey::MIN_KEY_LENGTH {
            return Err(ConfigError::Invalid(
                "PORTCULLIS_TOKEN_SECRET must be at least 32 bytes",
            ));
        }
        Ok(config)
    }

    /// Load `.env` (if present) into the process environment
    pub fn load_env() {
        dotenvy::dotenv().ok();
    }

    /// Load configuration from `PORTCULLIS_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("PORTCULLIS_TOKEN_SECRET")
            .ok_or(ConfigError::Missing("PORTCULLIS_TOKEN_SECRET"))?;
        let mut config = Self::try_new(secret)?;

        config.token_ttl = Duration::from_secs(parse_or(&lookup, "PORTCULLIS_TOKEN_TTL_SECS", 3600)?);
        config.lookup_timeout =
            Duration::from_millis(parse_or(&lookup, "PORTCULLIS_LOOKUP_TIMEOUT_MS", 5000)?);
        config.session = SessionConfig {
            session_timeout: Duration::from_secs(parse_or(
                &lookup,
                "PORTCULLIS_SESSION_TIMEOUT_SECS",
                86_400,
            )?),
            cleanup_interval: Duration::from_secs(parse_or(
                &lookup,
                "PORTCULLIS_CLEANUP_INTERVAL_SECS",
                300,
            )?),
        };

        if let Some(prefixes) = lookup("PORTCULLIS_API_KEY_PREFIXES") {
            let prefixes: Vec<String> = prefixes
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
            if prefixes.is_empty() {
                return Err(ConfigError::Invalid("PORTCULLIS_API_KEY_PREFIXES"));
            }
            config.api_keys.prefixes = prefixes;
        }
        config.api_keys.min_length =
            parse_or(&lookup, "PORTCULLIS_API_KEY_MIN_LENGTH", API_KEY_MIN_LENGTH)?;

        let defaults = Argon2Config::default();
        config.argon2 = Argon2Config {
            memory_cost_kb: parse_or(&lookup, "PORTCULLIS_ARGON2_MEMORY_KB", defaults.memory_cost_kb)?,
            time_cost: parse_or(&lookup, "PORTCULLIS_ARGON2_TIME_COST", defaults.time_cost)?,
            parallelism: parse_or(&lookup, "PORTCULLIS_ARGON2_PARALLELISM", defaults.parallelism)?,
            hash_length: parse_or(&lookup, "PORTCULLIS_ARGON2_HASH_LENGTH", defaults.hash_length)?,
        };
        config.strength.min_score = parse_or(
            &lookup,
            "PORTCULLIS_PASSWORD_MIN_SCORE",
            StrengthPolicy::default().min_score,
        )?;
        config.hashing_workers =
            parse_or(&lookup, "PORTCULLIS_HASH_WORKERS", config.hashing_workers)?;

        Ok(config)
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_api_keys(mut self, api_keys: ApiKeyPolicy) -> Self {
        self.api_keys = api_keys;
        self
    }

    pub fn with_oauth2_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.oauth2_permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_argon2(mut self, argon2: Argon2Config) -> Self {
        self.argon2 = argon2;
        self
    }

    pub fn with_strength(mut self, strength: StrengthPolicy) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_hashing_workers(mut self, workers: usize) -> Self {
        self.hashing_workers = workers;
        self
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &"[REDACTED]")
            .field("token_ttl", &self.token_ttl)
            .field("lookup_timeout", &self.lookup_timeout)
            .field("session", &self.session)
            .field("api_keys", &self.api_keys)
            .field("oauth2_permissions", &self.oauth2_permissions)
            .field("argon2", &self.argon2)
            .field("strength", &self.strength)
            .field("hashing_workers", &self.hashing_workers)
            .finish()
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
