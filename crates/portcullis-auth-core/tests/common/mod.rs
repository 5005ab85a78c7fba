//! Common test utilities for portcullis-auth-core integration tests

pub mod mock_collaborators;

use std::sync::Arc;

use portcullis_auth_core::{
    Argon2Config, AuthConfig, AuthCoordinator, ManualClock, SessionConfig,
};

#[allow(unused_imports)]
pub use mock_collaborators::{
    CountingPasswordHasher, MockApiKeyLookup, MockOAuth2Verifier, MockUserStore,
};

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Well-formed key accepted by `MockApiKeyLookup::accepting_test_key`
pub const TEST_API_KEY: &str = "agentui_0123456789abcdefghijklmnopqrstuv";

/// Cheap Argon2id parameters so tests stay fast
#[allow(dead_code)]
pub fn fast_argon2() -> Argon2Config {
    Argon2Config {
        memory_cost_kb: 1024,
        time_cost: 1,
        parallelism: 1,
        hash_length: 32,
    }
}

/// Install a test-writer subscriber once; `RUST_LOG` controls verbosity
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn test_config() -> AuthConfig {
    AuthConfig::new(TEST_SECRET)
        .with_argon2(fast_argon2())
        .with_hashing_workers(2)
        .with_session(SessionConfig::default())
}

/// Coordinator, its clock and the mocks behind it
#[allow(dead_code)]
pub struct Harness {
    pub coordinator: AuthCoordinator,
    pub clock: Arc<ManualClock>,
    pub api_keys: Arc<MockApiKeyLookup>,
    pub oauth2: Arc<MockOAuth2Verifier>,
    pub users: Arc<MockUserStore>,
}

#[allow(dead_code)]
pub fn harness() -> Harness {
    harness_with(test_config())
}

#[allow(dead_code)]
pub fn harness_with(config: AuthConfig) -> Harness {
    init_tracing();
    let clock = Arc::new(ManualClock::starting_now());
    let api_keys = Arc::new(MockApiKeyLookup::accepting_test_key());
    let oauth2 = Arc::new(MockOAuth2Verifier::accepting());
    let users = Arc::new(MockUserStore::new());

    let coordinator = AuthCoordinator::builder(config)
        .clock(clock.clone())
        .api_key_lookup(api_keys.clone())
        .oauth2_verifier(oauth2.clone())
        .user_store(users.clone())
        .build()
        .expect("test config is valid");

    Harness {
        coordinator,
        clock,
        api_keys,
        oauth2,
        users,
    }
}
