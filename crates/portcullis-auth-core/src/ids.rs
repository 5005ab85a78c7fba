//! Identifier generation

use chrono::{DateTime, Utc};
use portcullis_types::SessionId;
use rand::{rngs::OsRng, RngCore};

/// Injected unique-id generator
pub trait IdGenerator: Send + Sync {
    /// New session identifier, unique and unguessable
    fn session_id(&self, now: DateTime<Utc>) -> SessionId;

    /// New correlation identifier for requests that did not supply one
    fn correlation_id(&self) -> String;
}

/// Time-prefixed identifiers backed by OS randomness
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl RandomIdGenerator {
    /// Number of random bytes in a session ID
    pub const SESSION_ENTROPY_BYTES: usize = 16;
}

impl IdGenerator for RandomIdGenerator {
    fn session_id(&self, now: DateTime<Utc>) -> SessionId {
        let mut entropy = [0u8; Self::SESSION_ENTROPY_BYTES];
        OsRng.fill_bytes(&mut entropy);
        let millis = now.timestamp_millis().max(0);
        SessionId::new(format!("sess_{millis:x}_{}", hex::encode(entropy)))
    }

    fn correlation_id(&self) -> String {
        format!("corr_{}", uuid::Uuid::new_v4().simple())
    }
}
