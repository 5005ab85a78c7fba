//! Auth coordinator - ties together credential tiers, sessions and tokens
//!
//! Every public operation returns an [`AuthResult`]; failures are carried in
//! `AuthResult::error` rather than as `Err`, so callers always get the steps
//! executed and the correlation id back.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use portcullis_types::{
    is_well_formed_api_key, AuthMethod, AuthResult, AuthStep, ErrorCode, SecurityLevel, Session,
    SessionId, SessionMetadata, UserInfo,
};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    config::{AuthConfig, ConfigError},
    crypto::short_fingerprint,
    error::AuthError,
    ids::{IdGenerator, RandomIdGenerator},
    lookup::{
        ApiKeyLookup, LookupError, OAuth2Verifier, StaticApiKeyLookup, StaticOAuth2Verifier,
        UserRecord, UserRecordStore,
    },
    password::{Argon2Hasher, PasswordHasher, PasswordStrength},
    pool::HashingPool,
    request::{ApiKeyConfig, AuthCredentials, AuthRequest, JwtConfig, OAuth2Config, RequestContext},
    session::SessionStore,
    token::{HmacTokenIssuer, TokenClaims, TokenIssuer},
};

/// Session metadata key holding the level a session was established at
pub const SECURITY_LEVEL_KEY: &str = "securityLevel";

/// Role attached to API key identities
pub const API_CLIENT_ROLE: &str = "api_client";

/// Plaintext behind the hash verified for unknown emails
const DUMMY_PASSWORD: &str = "portcullis-unknown-user";

/// Role attached to OAuth2 identities
pub const ENTERPRISE_ROLE: &str = "enterprise";

/// Identity produced by a successful credential check
#[derive(Debug, Clone)]
struct TierIdentity {
    user: UserInfo,
    permissions: BTreeSet<String>,
    /// Live session and token presented by a bearer token
    reused: Option<(Session, String)>,
}

impl TierIdentity {
    fn new(user: UserInfo) -> Self {
        Self {
            permissions: user.permissions.clone(),
            user,
            reused: None,
        }
    }
}

/// Session plus the token bound to it
struct Established {
    session: Session,
    token: String,
}

/// Authentication coordinator
///
/// Provides a unified interface for:
/// - Single-tier authentication (API key, bearer token, OAuth2, password)
/// - The triple chain API key → token → OAuth2
/// - Session validation, refresh and destruction
///
/// Holds only configuration and shared collaborators, so one instance can
/// be wrapped in an `Arc` and used from any number of tasks.
pub struct AuthCoordinator {
    config: AuthConfig,
    sessions: Arc<SessionStore>,
    tokens: Arc<dyn TokenIssuer>,
    passwords: Arc<dyn PasswordHasher>,
    api_keys: Arc<dyn ApiKeyLookup>,
    oauth2: Arc<dyn OAuth2Verifier>,
    users: Option<Arc<dyn UserRecordStore>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    /// Hash under the current parameters, verified against for unknown emails
    dummy_hash: OnceCell<String>,
}

/// Builder wiring collaborators into an [`AuthCoordinator`]
///
/// Anything not supplied falls back to the built-in implementation: system
/// clock, random ids, HS256 issuer over `config.token_secret`, Argon2id on a
/// pool of `config.hashing_workers`, and empty key/client registries.
pub struct AuthCoordinatorBuilder {
    config: AuthConfig,
    tokens: Option<Arc<dyn TokenIssuer>>,
    passwords: Option<Arc<dyn PasswordHasher>>,
    api_keys: Option<Arc<dyn ApiKeyLookup>>,
    oauth2: Option<Arc<dyn OAuth2Verifier>>,
    users: Option<Arc<dyn UserRecordStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl AuthCoordinatorBuilder {
    pub fn api_key_lookup(mut self, lookup: Arc<dyn ApiKeyLookup>) -> Self {
        self.api_keys = Some(lookup);
        self
    }

    pub fn oauth2_verifier(mut self, verifier: Arc<dyn OAuth2Verifier>) -> Self {
        self.oauth2 = Some(verifier);
        self
    }

    pub fn user_store(mut self, users: Arc<dyn UserRecordStore>) -> Self {
        self.users = Some(users);
        self
    }

    pub fn token_issuer(mut self, tokens: Arc<dyn TokenIssuer>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn password_hasher(mut self, passwords: Arc<dyn PasswordHasher>) -> Self {
        self.passwords = Some(passwords);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Build the coordinator; starts the session sweep if a runtime is running
    pub fn build(self) -> Result<AuthCoordinator, ConfigError> {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self.ids.unwrap_or_else(|| Arc::new(RandomIdGenerator));

        let tokens = match self.tokens {
            Some(tokens) => tokens,
            None => {
                let issuer = HmacTokenIssuer::new(&config.token_secret, Arc::clone(&clock))
                    .map_err(|e| {
                        error!("Token secret rejected: {}", e);
                        ConfigError::Invalid("PORTCULLIS_TOKEN_SECRET must be at least 32 bytes")
                    })?;
                Arc::new(issuer) as Arc<dyn TokenIssuer>
            }
        };

        let passwords = self.passwords.unwrap_or_else(|| {
            Arc::new(Argon2Hasher::new(
                config.argon2,
                config.strength,
                HashingPool::new(config.hashing_workers),
            ))
        });

        let sessions = Arc::new(SessionStore::new(
            config.session.clone(),
            Arc::clone(&clock),
            Arc::clone(&ids),
        ));

        Ok(AuthCoordinator {
            sessions,
            tokens,
            passwords,
            api_keys: self
                .api_keys
                .unwrap_or_else(|| Arc::new(StaticApiKeyLookup::default())),
            oauth2: self
                .oauth2
                .unwrap_or_else(|| Arc::new(StaticOAuth2Verifier::default())),
            users: self.users,
            clock,
            ids,
            config,
            dummy_hash: OnceCell::new(),
        })
    }
}

impl AuthCoordinator {
    pub fn builder(config: AuthConfig) -> AuthCoordinatorBuilder {
        AuthCoordinatorBuilder {
            config,
            tokens: None,
            passwords: None,
            api_keys: None,
            oauth2: None,
            users: None,
            clock: None,
            ids: None,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Underlying session table
    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Stop the session sweep
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }

    // =========================================================================
    // Single-tier authentication
    // =========================================================================

    /// Authenticate with exactly one tier, recording one step
    pub async fn authenticate(&self, request: AuthRequest) -> AuthResult {
        let correlation_id = self.correlation_id(&request.context);
        let timeout = self.timeout(&request.context);
        let method = request.credentials.method();

        match request.credentials {
            AuthCredentials::ApiKey(config) => {
                self.run_single(method, correlation_id, self.check_api_key(&config, timeout))
                    .await
            }
            AuthCredentials::Jwt(config) => {
                self.run_single(method, correlation_id, self.check_jwt(&config))
                    .await
            }
            AuthCredentials::OAuth2(config) => {
                self.run_single(method, correlation_id, self.check_oauth2(&config, timeout))
                    .await
            }
        }
    }

    /// Authenticate from the loose JSON request shape
    pub async fn authenticate_json(&self, value: serde_json::Value) -> AuthResult {
        let (context, request) = AuthRequest::from_json(&value);
        match request {
            Ok(request) => self.authenticate(request).await,
            Err(err) => {
                let correlation_id = self.correlation_id(&context);
                debug!(correlation_id = %correlation_id, "Request named no usable method");
                self.failure(err, &correlation_id, Vec::new(), Instant::now(), SecurityLevel::Basic)
            }
        }
    }

    /// Authenticate by email and password (Basic level)
    pub async fn authenticate_password(
        &self,
        email: &str,
        password: &str,
        context: &RequestContext,
    ) -> AuthResult {
        let correlation_id = self.correlation_id(context);
        let timeout = self.timeout(context);
        self.run_single(
            AuthMethod::Password,
            correlation_id,
            self.check_password(email, password, timeout),
        )
        .await
    }

    /// Register (or replace) a password identity
    ///
    /// The user must carry an email; it is the login key.
    pub async fn register_password(
        &self,
        user: UserInfo,
        password: &str,
    ) -> Result<PasswordStrength, AuthError> {
        let users = self.user_store()?;
        if user.email.as_deref().map_or(true, |e| e.trim().is_empty()) {
            return Err(AuthError::InvalidCredentials);
        }

        let strength = self.passwords.score_strength(password);
        if !strength.is_valid {
            return Err(AuthError::WeakPassword {
                feedback: strength.feedback,
            });
        }

        let password_hash = self.passwords.hash(password).await.map_err(|e| {
            error!("Password hashing failed: {}", e);
            AuthError::HashingFailed
        })?;

        let user_id = user.id.clone();
        self.bounded(
            users.save(UserRecord {
                user,
                password_hash,
            }),
            self.config.lookup_timeout,
            ErrorCode::InternalError,
            "user store",
        )
        .await?;

        info!(user_id = %user_id, "Password identity registered");
        Ok(strength)
    }

    // =========================================================================
    // Triple chain
    // =========================================================================

    /// Run API key → token → OAuth2 in order, stopping at the first failure
    ///
    /// Each credential is checked independently. Only when all three pass is
    /// a single session established, for the OAuth2 identity, carrying the
    /// union of every step's permissions at Enterprise level.
    pub async fn authenticate_triple(
        &self,
        api_key: ApiKeyConfig,
        jwt: JwtConfig,
        oauth2: OAuth2Config,
        context: &RequestContext,
    ) -> AuthResult {
        let correlation_id = self.correlation_id(context);
        let timeout = self.timeout(context);
        let chain_started = Instant::now();

        let mut steps: Vec<AuthStep> = Vec::with_capacity(3);
        let mut granted: BTreeSet<String> = BTreeSet::new();
        let mut reached = SecurityLevel::Basic;

        // API key
        let started = Instant::now();
        let outcome = self.check_api_key(&api_key, timeout).await;
        if let Err(err) =
            self.record_check(&mut steps, AuthMethod::ApiKey, started, &outcome, &correlation_id)
        {
            return self.failure(err, &correlation_id, steps, chain_started, reached);
        }
        self.absorb(outcome, &mut granted, &mut reached, AuthMethod::ApiKey);

        // Bearer token
        let started = Instant::now();
        let outcome = self.check_jwt(&jwt).await;
        if let Err(err) =
            self.record_check(&mut steps, AuthMethod::Jwt, started, &outcome, &correlation_id)
        {
            return self.failure(err, &correlation_id, steps, chain_started, reached);
        }
        self.absorb(outcome, &mut granted, &mut reached, AuthMethod::Jwt);

        // OAuth2
        let started = Instant::now();
        let outcome = self.check_oauth2(&oauth2, timeout).await;
        if let Err(err) =
            self.record_check(&mut steps, AuthMethod::OAuth2, started, &outcome, &correlation_id)
        {
            return self.failure(err, &correlation_id, steps, chain_started, reached);
        }
        let Ok(mut identity) = outcome else {
            return self.failure(AuthError::Internal, &correlation_id, steps, chain_started, reached);
        };

        granted.extend(identity.permissions.iter().cloned());
        identity.user.permissions = granted.clone();
        identity.permissions = granted;
        identity.reused = None;

        match self.establish(identity, SecurityLevel::Enterprise) {
            Ok(established) => {
                info!(
                    correlation_id = %correlation_id,
                    user_id = %established.session.user_id,
                    "Triple-chain authentication succeeded"
                );
                self.success(established, steps, chain_started, SecurityLevel::Enterprise, correlation_id)
            }
            Err(err) => self.failure(err, &correlation_id, steps, chain_started, reached),
        }
    }

    // =========================================================================
    // Session operations
    // =========================================================================

    /// Look up a live session and mark it accessed
    pub async fn validate_session(&self, id: &SessionId, context: &RequestContext) -> AuthResult {
        let correlation_id = self.correlation_id(context);
        let started = Instant::now();

        match self.sessions.validate(id) {
            Ok(session) => {
                let level = session_level(&session);
                AuthResult {
                    success: true,
                    session_id: Some(session.id.clone()),
                    token: None,
                    expires_at: Some(session.expires_at),
                    permissions: session.permissions.iter().cloned().collect(),
                    user: Some(session.user),
                    steps: Vec::new(),
                    total_duration_ms: elapsed_ms(started),
                    security_level: level,
                    error: None,
                    correlation_id,
                }
            }
            Err(_) => self.failure(
                AuthError::SessionNotFound,
                &correlation_id,
                Vec::new(),
                started,
                SecurityLevel::Basic,
            ),
        }
    }

    /// Rotate a session to a new id and issue a fresh token
    ///
    /// The old id stops validating before the new one exists.
    pub async fn refresh_session(&self, id: &SessionId, context: &RequestContext) -> AuthResult {
        let correlation_id = self.correlation_id(context);
        let started = Instant::now();

        let session = match self.sessions.refresh(id) {
            Ok(session) => session,
            Err(_) => {
                debug!(correlation_id = %correlation_id, "Refresh of unknown or expired session");
                return self.failure(
                    AuthError::SessionRefreshFailed,
                    &correlation_id,
                    Vec::new(),
                    started,
                    SecurityLevel::Basic,
                );
            }
        };

        let level = session_level(&session);
        match self.sign_for(&session) {
            Ok(token) => {
                info!(correlation_id = %correlation_id, user_id = %session.user_id, "Session refreshed");
                self.success(
                    Established { session, token },
                    Vec::new(),
                    started,
                    level,
                    correlation_id,
                )
            }
            Err(err) => {
                self.sessions.destroy(&session.id);
                self.failure(err, &correlation_id, Vec::new(), started, SecurityLevel::Basic)
            }
        }
    }

    /// End a session
    pub async fn destroy_session(&self, id: &SessionId, context: &RequestContext) -> AuthResult {
        let correlation_id = self.correlation_id(context);
        let started = Instant::now();

        if self.sessions.destroy(id) {
            AuthResult {
                success: true,
                session_id: Some(id.clone()),
                token: None,
                expires_at: None,
                permissions: Vec::new(),
                user: None,
                steps: Vec::new(),
                total_duration_ms: elapsed_ms(started),
                security_level: SecurityLevel::Basic,
                error: None,
                correlation_id,
            }
        } else {
            self.failure(
                AuthError::SessionDestroyFailed,
                &correlation_id,
                Vec::new(),
                started,
                SecurityLevel::Basic,
            )
        }
    }

    // =========================================================================
    // Tier checks
    // =========================================================================

    async fn check_api_key(
        &self,
        config: &ApiKeyConfig,
        timeout: Duration,
    ) -> Result<TierIdentity, AuthError> {
        let policy = &self.config.api_keys;
        if !is_well_formed_api_key(&config.api_key, &policy.prefixes, policy.min_length) {
            return Err(AuthError::InvalidApiKeyFormat);
        }

        let fingerprint = short_fingerprint(&config.api_key);
        let accepted = self
            .bounded(
                self.api_keys.lookup(&config.api_key),
                timeout,
                ErrorCode::InvalidApiKey,
                "API key lookup",
            )
            .await?;
        if !accepted {
            debug!(key = %fingerprint, "API key rejected");
            return Err(AuthError::InvalidApiKey);
        }

        let permissions = if config.permissions.is_empty() {
            &policy.default_permissions
        } else {
            &config.permissions
        };
        let user = UserInfo::new(format!("apikey_{fingerprint}"))
            .with_permissions(permissions.iter().cloned())
            .with_roles([API_CLIENT_ROLE]);
        Ok(TierIdentity::new(user))
    }

    async fn check_jwt(&self, config: &JwtConfig) -> Result<TierIdentity, AuthError> {
        if config.token.trim().is_empty() {
            return Err(AuthError::InvalidOrExpiredToken { expired: false });
        }
        let claims = self.tokens.verify(&config.token)?;

        // A token bound to a live session keeps that session
        if let Some(session_id) = claims.session_id.as_deref() {
            if let Ok(session) = self.sessions.validate(&SessionId::from(session_id)) {
                if session.user_id == claims.user_id {
                    let mut identity = TierIdentity::new(session.user.clone());
                    identity.permissions = session.permissions.clone();
                    identity.reused = Some((session, config.token.clone()));
                    return Ok(identity);
                }
            }
        }

        let mut user = UserInfo::new(claims.user_id)
            .with_permissions(claims.permissions)
            .with_roles(claims.roles);
        user.email = claims.email;
        user.name = claims.name;
        Ok(TierIdentity::new(user))
    }

    async fn check_oauth2(
        &self,
        config: &OAuth2Config,
        timeout: Duration,
    ) -> Result<TierIdentity, AuthError> {
        let client_id = required(&config.client_id, "clientId")?;
        let client_secret = required(&config.client_secret, "clientSecret")?;
        let redirect_uri = required(&config.redirect_uri, "redirectUri")?;
        let provider = required(&config.provider, "provider")?;

        let redirect_ok = url::Url::parse(redirect_uri)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
            .unwrap_or(false);
        if !redirect_ok {
            return Err(AuthError::MissingOAuth2Config("redirectUri"));
        }

        let trimmed = OAuth2Config {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            provider: provider.to_string(),
            scopes: config.scopes.clone(),
        };
        let accepted = self
            .bounded(
                self.oauth2.verify(&trimmed),
                timeout,
                ErrorCode::InvalidOAuth2Credentials,
                "OAuth2 verification",
            )
            .await?;
        if !accepted {
            debug!(client_id, provider, "OAuth2 client rejected");
            return Err(AuthError::InvalidOAuth2Credentials);
        }

        let user = UserInfo::new(format!("oauth2_{}_{}", provider.to_lowercase(), client_id))
            .with_permissions(self.config.oauth2_permissions.iter().cloned())
            .with_roles([ENTERPRISE_ROLE]);
        Ok(TierIdentity::new(user))
    }

    async fn check_password(
        &self,
        email: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<TierIdentity, AuthError> {
        let users = self.user_store()?;
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }

        let record = self
            .bounded(
                users.find_by_email(email.trim()),
                timeout,
                ErrorCode::InvalidCredentials,
                "user lookup",
            )
            .await?;
        let Some(record) = record else {
            debug!("Login for unknown email");
            self.verify_against_dummy(password).await;
            return Err(AuthError::InvalidCredentials);
        };

        if !self.passwords.verify(password, &record.password_hash).await {
            debug!(user_id = %record.user.id, "Password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        if self.passwords.needs_rehash(&record.password_hash) {
            self.upgrade_hash(users, &record.user.id, password, timeout).await;
        }

        Ok(TierIdentity::new(record.user))
    }

    /// Spend one verification so unknown emails cost the same as wrong passwords
    async fn verify_against_dummy(&self, password: &str) {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.passwords.hash(DUMMY_PASSWORD))
            .await;
        match hash {
            Ok(hash) => {
                let _ = self.passwords.verify(password, hash).await;
            }
            Err(e) => warn!("Dummy hash unavailable: {}", e),
        }
    }

    /// Re-hash under the current parameters; never fails the login
    async fn upgrade_hash(
        &self,
        users: &Arc<dyn UserRecordStore>,
        user_id: &str,
        password: &str,
        timeout: Duration,
    ) {
        let hash = match self.passwords.hash(password).await {
            Ok(hash) => hash,
            Err(e) => {
                warn!(user_id, "Rehash failed: {}", e);
                return;
            }
        };
        match tokio::time::timeout(timeout, users.update_password_hash(user_id, &hash)).await {
            Ok(Ok(())) => info!(user_id, "Password hash upgraded"),
            Ok(Err(e)) => warn!(user_id, "Storing upgraded hash failed: {}", e),
            Err(_) => warn!(user_id, "Storing upgraded hash timed out"),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn run_single<F>(
        &self,
        method: AuthMethod,
        correlation_id: String,
        check: F,
    ) -> AuthResult
    where
        F: Future<Output = Result<TierIdentity, AuthError>>,
    {
        let started = Instant::now();
        let level = method.security_level();
        let outcome = match check.await {
            Ok(identity) => self.establish(identity, level),
            Err(err) => Err(err),
        };
        let duration_ms = elapsed_ms(started);

        match outcome {
            Ok(established) => {
                let step = AuthStep {
                    step: 1,
                    method,
                    duration_ms,
                    success: true,
                    permissions: established.session.permissions.iter().cloned().collect(),
                    security_level: level,
                    correlation_id: correlation_id.clone(),
                };
                info!(
                    correlation_id = %correlation_id,
                    method = %method,
                    user_id = %established.session.user_id,
                    "Authentication succeeded"
                );
                self.success(established, vec![step], started, level, correlation_id)
            }
            Err(err) => {
                let step = failed_step(1, method, duration_ms, &correlation_id);
                debug!(correlation_id = %correlation_id, method = %method, code = %err.code(), "Authentication failed");
                self.failure(err, &correlation_id, vec![step], started, SecurityLevel::Basic)
            }
        }
    }

    /// Append the step for a tier check; returns the error if the check failed
    fn record_check(
        &self,
        steps: &mut Vec<AuthStep>,
        method: AuthMethod,
        started: Instant,
        outcome: &Result<TierIdentity, AuthError>,
        correlation_id: &str,
    ) -> Result<(), AuthError> {
        let step = steps.len() as u32 + 1;
        let duration_ms = elapsed_ms(started);
        match outcome {
            Ok(identity) => {
                steps.push(AuthStep {
                    step,
                    method,
                    duration_ms,
                    success: true,
                    permissions: identity.permissions.iter().cloned().collect(),
                    security_level: method.security_level(),
                    correlation_id: correlation_id.to_string(),
                });
                Ok(())
            }
            Err(err) => {
                steps.push(failed_step(step, method, duration_ms, correlation_id));
                debug!(correlation_id, method = %method, step, code = %err.code(), "Chain stopped");
                Err(err.clone())
            }
        }
    }

    fn absorb(
        &self,
        outcome: Result<TierIdentity, AuthError>,
        granted: &mut BTreeSet<String>,
        reached: &mut SecurityLevel,
        method: AuthMethod,
    ) {
        if let Ok(identity) = outcome {
            granted.extend(identity.permissions);
            *reached = (*reached).max(method.security_level());
        }
    }

    /// Create the session and sign its token, or hand back a reused pair
    fn establish(
        &self,
        identity: TierIdentity,
        level: SecurityLevel,
    ) -> Result<Established, AuthError> {
        if let Some((session, token)) = identity.reused {
            return Ok(Established { session, token });
        }

        let mut metadata = SessionMetadata::new();
        metadata.insert(
            SECURITY_LEVEL_KEY.to_string(),
            serde_json::Value::String(level.as_str().to_string()),
        );
        let session =
            self.sessions
                .create_with_metadata(identity.user, identity.permissions, metadata);

        match self.sign_for(&session) {
            Ok(token) => Ok(Established { session, token }),
            Err(err) => {
                // No session without a token
                self.sessions.destroy(&session.id);
                Err(err)
            }
        }
    }

    fn sign_for(&self, session: &Session) -> Result<String, AuthError> {
        let claims = TokenClaims::new(session.user_id.clone())
            .with_session(session.id.as_str())
            .with_permissions(session.permissions.iter().cloned())
            .with_roles(session.user.roles.iter().cloned())
            .with_profile(session.user.email.clone(), session.user.name.clone());
        self.tokens.sign(&claims, self.config.token_ttl).map_err(|e| {
            error!("Token signing failed: {}", e);
            AuthError::from(e)
        })
    }

    /// Run a collaborator call under a deadline
    ///
    /// Timeouts and collaborator errors are recoverable under `code`.
    async fn bounded<T, F>(
        &self,
        call: F,
        timeout: Duration,
        code: ErrorCode,
        what: &'static str,
    ) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, LookupError>>,
    {
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(collaborator = what, "Collaborator failed: {}", e);
                Err(AuthError::unavailable(code, format!("{what} failed")))
            }
            Err(_) => {
                warn!(collaborator = what, ?timeout, "Collaborator timed out");
                Err(AuthError::unavailable(code, format!("{what} timed out")))
            }
        }
    }

    fn user_store(&self) -> Result<&Arc<dyn UserRecordStore>, AuthError> {
        self.users.as_ref().ok_or_else(|| {
            error!("Password operation without a configured user store");
            AuthError::Internal
        })
    }

    fn success(
        &self,
        established: Established,
        steps: Vec<AuthStep>,
        started: Instant,
        level: SecurityLevel,
        correlation_id: String,
    ) -> AuthResult {
        let Established { session, token } = established;
        AuthResult {
            success: true,
            session_id: Some(session.id),
            token: Some(token),
            expires_at: Some(session.expires_at),
            permissions: session.permissions.into_iter().collect(),
            user: Some(session.user),
            steps,
            total_duration_ms: elapsed_ms(started),
            security_level: level,
            error: None,
            correlation_id,
        }
    }

    fn failure(
        &self,
        err: AuthError,
        correlation_id: &str,
        steps: Vec<AuthStep>,
        started: Instant,
        level: SecurityLevel,
    ) -> AuthResult {
        let info = err.to_info(correlation_id, self.clock.now());
        AuthResult::failure(info, steps, elapsed_ms(started), level)
    }

    fn correlation_id(&self, context: &RequestContext) -> String {
        context
            .correlation_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.ids.correlation_id())
    }

    fn timeout(&self, context: &RequestContext) -> Duration {
        context.timeout.unwrap_or(self.config.lookup_timeout)
    }
}

impl std::fmt::Debug for AuthCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCoordinator")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, AuthError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AuthError::MissingOAuth2Config(field));
    }
    Ok(trimmed)
}

fn failed_step(step: u32, method: AuthMethod, duration_ms: u64, correlation_id: &str) -> AuthStep {
    AuthStep {
        step,
        method,
        duration_ms,
        success: false,
        permissions: Vec::new(),
        security_level: method.security_level(),
        correlation_id: correlation_id.to_string(),
    }
}

/// Level a session was established at, Basic if unrecorded
fn session_level(session: &Session) -> SecurityLevel {
    session
        .metadata_str(SECURITY_LEVEL_KEY)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
