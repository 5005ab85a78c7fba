//! External credential collaborators
//!
//! The coordinator never owns credential databases. It asks these traits,
//! always under a deadline. In-memory implementations are provided for
//! embedding and tests.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use portcullis_types::UserInfo;

use crate::crypto::{constant_time_str_eq, fingerprint};
use crate::request::OAuth2Config;

/// Collaborator failures; always recoverable from the caller's side
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("lookup backend unavailable: {0}")]
    Unavailable(String),

    #[error("lookup failed: {0}")]
    Backend(String),
}

/// Decides whether a well-formed API key is active
#[async_trait]
pub trait ApiKeyLookup: Send + Sync {
    async fn lookup(&self, api_key: &str) -> Result<bool, LookupError>;
}

/// Decides whether OAuth2 client credentials are accepted by the provider
#[async_trait]
pub trait OAuth2Verifier: Send + Sync {
    async fn verify(&self, credentials: &OAuth2Config) -> Result<bool, LookupError>;
}

/// Stored password identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user: UserInfo,
    /// PHC string
    pub password_hash: String,
}

/// User records for the password tier
#[async_trait]
pub trait UserRecordStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, LookupError>;

    /// Store a new record or replace the one with the same email
    async fn save(&self, record: UserRecord) -> Result<(), LookupError>;

    async fn update_password_hash(&self, user_id: &str, hash: &str) -> Result<(), LookupError>;
}

// =============================================================================
// In-memory implementations
// =============================================================================

/// Fixed set of accepted API keys, held only as SHA-256 fingerprints
#[derive(Debug, Default)]
pub struct StaticApiKeyLookup {
    fingerprints: DashSet<String>,
}

impl StaticApiKeyLookup {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lookup = Self::default();
        for key in keys {
            lookup.insert(key.as_ref());
        }
        lookup
    }

    pub fn insert(&self, api_key: &str) {
        self.fingerprints.insert(fingerprint(api_key));
    }

    /// Returns `true` if the key was present
    pub fn revoke(&self, api_key: &str) -> bool {
        self.fingerprints.remove(&fingerprint(api_key)).is_some()
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

#[async_trait]
impl ApiKeyLookup for StaticApiKeyLookup {
    async fn lookup(&self, api_key: &str) -> Result<bool, LookupError> {
        let candidate = fingerprint(api_key);
        // Compare against every entry; no early exit
        let found = self
            .fingerprints
            .iter()
            .fold(false, |found, fp| found | constant_time_str_eq(fp.key(), &candidate));
        Ok(found)
    }
}

#[derive(Debug, Clone)]
struct RegisteredClient {
    provider: String,
    secret_fingerprint: String,
    redirect_uris: Vec<String>,
}

/// Registered OAuth2 clients with hashed secrets and allowed redirect URIs
#[derive(Debug, Default)]
pub struct StaticOAuth2Verifier {
    clients: DashMap<String, RegisteredClient>,
}

impl StaticOAuth2Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a client
    pub fn register<I, S>(&self, provider: &str, client_id: &str, client_secret: &str, redirect_uris: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clients.insert(
            client_id.to_string(),
            RegisteredClient {
                provider: provider.to_string(),
                secret_fingerprint: fingerprint(client_secret),
                redirect_uris: redirect_uris.into_iter().map(Into::into).collect(),
            },
        );
    }

    pub fn remove(&self, client_id: &str) -> bool {
        self.clients.remove(client_id).is_some()
    }
}

#[async_trait]
impl OAuth2Verifier for StaticOAuth2Verifier {
    async fn verify(&self, credentials: &OAuth2Config) -> Result<bool, LookupError> {
        let Some(client) = self.clients.get(&credentials.client_id) else {
            return Ok(false);
        };
        let secret_ok = constant_time_str_eq(
            &client.secret_fingerprint,
            &fingerprint(&credentials.client_secret),
        );
        let provider_ok = client.provider.eq_ignore_ascii_case(&credentials.provider);
        let redirect_ok = client
            .redirect_uris
            .iter()
            .any(|uri| uri == &credentials.redirect_uri);
        Ok(secret_ok && provider_ok && redirect_ok)
    }
}

/// User records keyed by lowercased email
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    by_email: DashMap<String, UserRecord>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

#[async_trait]
impl UserRecordStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, LookupError> {
        Ok(self
            .by_email
            .get(&email.to_lowercase())
            .map(|r| r.value().clone()))
    }

    async fn save(&self, record: UserRecord) -> Result<(), LookupError> {
        let email = record
            .user
            .email
            .as_deref()
            .ok_or_else(|| LookupError::Backend("user record has no email".into()))?
            .to_lowercase();
        self.by_email.insert(email, record);
        Ok(())
    }

    async fn update_password_hash(&self, user_id: &str, hash: &str) -> Result<(), LookupError> {
        let mut record = self
            .by_email
            .iter_mut()
            .find(|r| r.user.id == user_id)
            .ok_or_else(|| LookupError::Backend(format!("unknown user {user_id}")))?;
        record.password_hash = hash.to_string();
        Ok(())
    }
}
