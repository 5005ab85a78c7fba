//! Mock collaborators for testing

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use portcullis_auth_core::{
    ApiKeyLookup, Argon2Hasher, HashingPool, LookupError, OAuth2Config, OAuth2Verifier,
    PasswordError, PasswordHasher, PasswordStrength, StrengthPolicy, UserRecord,
    UserRecordStore,
};

use super::{fast_argon2, TEST_API_KEY};

/// API key lookup with call counting, latency and failure injection
#[derive(Default)]
pub struct MockApiKeyLookup {
    keys: DashSet<String>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    failing: AtomicBool,
}

#[allow(dead_code)]
impl MockApiKeyLookup {
    pub fn accepting_test_key() -> Self {
        let lookup = Self::default();
        lookup.keys.insert(TEST_API_KEY.to_string());
        lookup
    }

    /// Sleeps before answering
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::accepting_test_key()
        }
    }

    pub fn add_key(&self, key: &str) {
        self.keys.insert(key.to_string());
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApiKeyLookup for MockApiKeyLookup {
    async fn lookup(&self, api_key: &str) -> Result<bool, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(LookupError::Unavailable("connection refused".into()));
        }
        Ok(self.keys.contains(api_key))
    }
}

/// OAuth2 verifier with a fixed verdict and call counting
pub struct MockOAuth2Verifier {
    accept: AtomicBool,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

#[allow(dead_code)]
impl MockOAuth2Verifier {
    pub fn accepting() -> Self {
        Self {
            accept: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn rejecting() -> Self {
        let verifier = Self::accepting();
        verifier.accept.store(false, Ordering::SeqCst);
        verifier
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::accepting()
        }
    }

    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuth2Verifier for MockOAuth2Verifier {
    async fn verify(&self, _credentials: &OAuth2Config) -> Result<bool, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.accept.load(Ordering::SeqCst))
    }
}

/// In-memory user store recording hash write-backs
#[derive(Default)]
pub struct MockUserStore {
    by_email: DashMap<String, UserRecord>,
    hash_updates: AtomicUsize,
}

#[allow(dead_code)]
impl MockUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record directly, bypassing registration
    pub fn insert_record(&self, record: UserRecord) {
        let email = record.user.email.clone().unwrap_or_default();
        self.by_email.insert(email, record);
    }

    pub fn record(&self, email: &str) -> Option<UserRecord> {
        self.by_email.get(email).map(|r| r.value().clone())
    }

    pub fn hash_updates(&self) -> usize {
        self.hash_updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserRecordStore for MockUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, LookupError> {
        Ok(self.record(email))
    }

    async fn save(&self, record: UserRecord) -> Result<(), LookupError> {
        self.insert_record(record);
        Ok(())
    }

    async fn update_password_hash(&self, user_id: &str, hash: &str) -> Result<(), LookupError> {
        let mut record = self
            .by_email
            .iter_mut()
            .find(|r| r.user.id == user_id)
            .ok_or_else(|| LookupError::Backend(format!("unknown user {user_id}")))?;
        record.password_hash = hash.to_string();
        self.hash_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Real Argon2id hasher that counts hash and verify calls
pub struct CountingPasswordHasher {
    inner: Argon2Hasher,
    hashes: AtomicUsize,
    verifies: AtomicUsize,
}

#[allow(dead_code)]
impl CountingPasswordHasher {
    pub fn new() -> Self {
        Self {
            inner: Argon2Hasher::new(fast_argon2(), StrengthPolicy::default(), HashingPool::new(2)),
            hashes: AtomicUsize::new(0),
            verifies: AtomicUsize::new(0),
        }
    }

    pub fn hashes(&self) -> usize {
        self.hashes.load(Ordering::SeqCst)
    }

    pub fn verifies(&self) -> usize {
        self.verifies.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.hashes.store(0, Ordering::SeqCst);
        self.verifies.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl PasswordHasher for CountingPasswordHasher {
    async fn hash(&self, password: &str) -> Result<String, PasswordError> {
        self.hashes.fetch_add(1, Ordering::SeqCst);
        self.inner.hash(password).await
    }

    async fn verify(&self, password: &str, hash: &str) -> bool {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(password, hash).await
    }

    fn needs_rehash(&self, hash: &str) -> bool {
        self.inner.needs_rehash(hash)
    }

    fn score_strength(&self, password: &str) -> PasswordStrength {
        self.inner.score_strength(password)
    }
}
