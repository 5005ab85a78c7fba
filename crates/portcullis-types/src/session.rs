//! Session types

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserInfo;

/// Unique session identifier.
///
/// Opaque to callers; generated by the session store from the current time
/// and OS randomness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing identifier string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the identifier string
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque per-session metadata
pub type SessionMetadata = BTreeMap<String, serde_json::Value>;

/// Authenticated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session ID
    pub id: SessionId,
    /// Owning user ID (copy of `user.id`)
    pub user_id: String,
    /// Identity the session was established for
    pub user: UserInfo,
    /// Session creation time
    pub created_at: DateTime<Utc>,
    /// Session expiration time
    pub expires_at: DateTime<Utc>,
    /// Last successful lookup
    pub last_accessed_at: DateTime<Utc>,
    /// Permissions captured at creation time
    pub permissions: BTreeSet<String>,
    /// Opaque metadata
    #[serde(default)]
    pub metadata: SessionMetadata,
}

impl Session {
    /// Check expiry against a given instant (`now >= expires_at` is expired)
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check expiry against the system clock
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Remaining lifetime, zero once expired
    pub fn remaining_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.expires_at - now).max(chrono::Duration::zero())
    }

    /// Look up a metadata entry
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session_at(created: DateTime<Utc>, ttl_ms: i64) -> Session {
        Session {
            id: SessionId::new("sess_test"),
            user_id: "u-1".to_string(),
            user: UserInfo::new("u-1"),
            created_at: created,
            expires_at: created + Duration::milliseconds(ttl_ms),
            last_accessed_at: created,
            permissions: BTreeSet::new(),
            metadata: SessionMetadata::new(),
        }
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let t = Utc::now();
        let session = session_at(t, 1000);
        assert!(!session.is_expired_at(t + Duration::milliseconds(999)));
        assert!(session.is_expired_at(t + Duration::milliseconds(1000)));
    }

    #[test]
    fn test_remaining_never_negative() {
        let t = Utc::now();
        let session = session_at(t, 10);
        assert_eq!(
            session.remaining_at(t + Duration::seconds(5)),
            Duration::zero()
        );
    }

    #[test]
    fn test_session_id_is_transparent() {
        let id = SessionId::new("sess_abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"sess_abc\"");
        assert_eq!(id.to_string(), "sess_abc");
    }
}
