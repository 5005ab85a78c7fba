//! Portcullis Auth Core - authentication and session lifecycle
//!
//! Tiered credential checks (API key, bearer token, OAuth2 client
//! credentials, password), an in-memory session table with TTL sweep,
//! HS256 token issuing and Argon2id password hashing on a bounded pool.

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod crypto;
pub mod error;
pub mod ids;
pub mod lookup;
pub mod password;
pub mod pool;
pub mod request;
pub mod session;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ApiKeyPolicy, AuthConfig, ConfigError};
pub use coordinator::{AuthCoordinator, AuthCoordinatorBuilder};
pub use crypto::{constant_time_eq, HmacKey, HmacKeyError};
pub use error::AuthError;
pub use ids::{IdGenerator, RandomIdGenerator};
pub use lookup::{
    ApiKeyLookup, InMemoryUserStore, LookupError, OAuth2Verifier, StaticApiKeyLookup,
    StaticOAuth2Verifier, UserRecord, UserRecordStore,
};
pub use password::{
    Argon2Config, Argon2Hasher, PasswordError, PasswordHasher, PasswordStrength, StrengthPolicy,
};
pub use pool::{HashingPool, PoolError};
pub use request::{
    ApiKeyConfig, AuthCredentials, AuthRequest, JwtConfig, OAuth2Config, RequestContext,
};
pub use session::{SessionConfig, SessionError, SessionStore, SessionStoreStats};
pub use token::{HmacTokenIssuer, TokenClaims, TokenError, TokenIssuer};
