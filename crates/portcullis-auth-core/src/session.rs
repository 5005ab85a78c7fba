//! In-memory session table with TTL enforcement
//!
//! Sessions live in a sharded `DashMap`. Every read-then-maybe-delete runs
//! under a single entry lock, and refresh consumes the old id with an atomic
//! `remove`, so two concurrent refreshes of the same id cannot both succeed.
//!
//! A background sweep owned by the store evicts expired entries every
//! `cleanup_interval`. It is stopped by [`SessionStore::shutdown`] and
//! aborted when the store is dropped.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use portcullis_types::{Session, SessionId, SessionMetadata, UserInfo};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::ids::IdGenerator;

// =============================================================================
// Configuration
// =============================================================================

/// Session lifetime settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime of a session from creation (or refresh)
    pub session_timeout: Duration,

    /// How often the background sweep runs
    pub cleanup_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(24 * 60 * 60), // 24 hours
            cleanup_interval: Duration::from_secs(5 * 60),      // 5 minutes
        }
    }
}

impl SessionConfig {
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

/// Session lookup errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Absent, already consumed, or expired
    #[error("session not found")]
    NotFound,
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Debug, Default)]
struct Counters {
    created: AtomicU64,
    refreshed: AtomicU64,
    destroyed: AtomicU64,
    expired: AtomicU64,
}

/// Point-in-time counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStoreStats {
    pub active: usize,
    pub created: u64,
    pub refreshed: u64,
    pub destroyed: u64,
    pub expired: u64,
}

// =============================================================================
// Store
// =============================================================================

struct Inner {
    table: DashMap<SessionId, Session>,
    counters: Counters,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    ttl: chrono::Duration,
}

impl Inner {
    fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0usize;
        self.table.retain(|_, session| {
            let keep = !session.is_expired_at(now);
            removed += usize::from(!keep);
            keep
        });
        if removed > 0 {
            self.counters
                .expired
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    fn build(
        &self,
        user: UserInfo,
        permissions: BTreeSet<String>,
        metadata: SessionMetadata,
        now: DateTime<Utc>,
    ) -> Session {
        Session {
            id: self.ids.session_id(now),
            user_id: user.id.clone(),
            user,
            created_at: now,
            expires_at: now
                .checked_add_signed(self.ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            last_accessed_at: now,
            permissions,
            metadata,
        }
    }
}

/// Concurrent session table
pub struct SessionStore {
    inner: Arc<Inner>,
    shutdown_tx: Mutex<Option<mpsc::Sender<()>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    /// Create a store; the sweep task starts if a Tokio runtime is running
    pub fn new(config: SessionConfig, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        let ttl = chrono::Duration::from_std(config.session_timeout)
            .unwrap_or(chrono::Duration::MAX)
            .max(chrono::Duration::milliseconds(1));

        let inner = Arc::new(Inner {
            table: DashMap::new(),
            counters: Counters::default(),
            clock,
            ids,
            ttl,
        });

        let (shutdown_tx, sweeper) = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let (tx, rx) = mpsc::channel(1);
                let task = handle.spawn(sweep_loop(
                    Arc::downgrade(&inner),
                    config.cleanup_interval,
                    rx,
                ));
                (Some(tx), Some(task))
            }
            Err(_) => {
                warn!("No Tokio runtime; session sweep disabled, expired sessions are evicted on access");
                (None, None)
            }
        };

        Self {
            inner,
            shutdown_tx: Mutex::new(shutdown_tx),
            sweeper: Mutex::new(sweeper),
        }
    }

    /// Create a session with empty metadata
    pub fn create(&self, user: UserInfo, permissions: BTreeSet<String>) -> Session {
        self.create_with_metadata(user, permissions, SessionMetadata::new())
    }

    /// Create a session; `expires_at = now + session_timeout`
    pub fn create_with_metadata(
        &self,
        user: UserInfo,
        permissions: BTreeSet<String>,
        metadata: SessionMetadata,
    ) -> Session {
        let now = self.inner.clock.now();
        let session = self.inner.build(user, permissions, metadata, now);
        self.inner
            .table
            .insert(session.id.clone(), session.clone());
        self.inner.counters.created.fetch_add(1, Ordering::Relaxed);
        info!(user_id = %session.user_id, expires_at = %session.expires_at, "Session created");
        session
    }

    /// Look up a live session and mark it accessed
    ///
    /// An expired entry is removed on the way out.
    pub fn validate(&self, id: &SessionId) -> Result<Session, SessionError> {
        let now = self.inner.clock.now();
        match self.inner.table.entry(id.clone()) {
            Entry::Occupied(entry) if entry.get().is_expired_at(now) => {
                entry.remove();
                self.inner.counters.expired.fetch_add(1, Ordering::Relaxed);
                debug!("Session expired on access");
                Err(SessionError::NotFound)
            }
            Entry::Occupied(mut entry) => {
                let session = entry.get_mut();
                session.last_accessed_at = now;
                Ok(session.clone())
            }
            Entry::Vacant(_) => Err(SessionError::NotFound),
        }
    }

    /// Rotate a session to a new id
    ///
    /// The old id is consumed before the replacement is inserted, so exactly
    /// one concurrent caller wins and both ids are never valid together.
    pub fn refresh(&self, id: &SessionId) -> Result<Session, SessionError> {
        let (_, old) = self.inner.table.remove(id).ok_or(SessionError::NotFound)?;

        let now = self.inner.clock.now();
        if old.is_expired_at(now) {
            self.inner.counters.expired.fetch_add(1, Ordering::Relaxed);
            return Err(SessionError::NotFound);
        }

        let session = self
            .inner
            .build(old.user, old.permissions, old.metadata, now);
        self.inner
            .table
            .insert(session.id.clone(), session.clone());
        self.inner.counters.refreshed.fetch_add(1, Ordering::Relaxed);
        info!(user_id = %session.user_id, "Session refreshed");
        Ok(session)
    }

    /// Remove a session; `true` if it was present
    pub fn destroy(&self, id: &SessionId) -> bool {
        let removed = self.inner.table.remove(id).is_some();
        if removed {
            self.inner.counters.destroyed.fetch_add(1, Ordering::Relaxed);
            info!("Session destroyed");
        }
        removed
    }

    /// Read a live session without touching `last_accessed_at`
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        let now = self.inner.clock.now();
        self.inner
            .table
            .get(id)
            .filter(|s| !s.is_expired_at(now))
            .map(|s| s.value().clone())
    }

    /// All live sessions owned by a user
    pub fn sessions_for_user(&self, user_id: &str) -> Vec<Session> {
        let now = self.inner.clock.now();
        self.inner
            .table
            .iter()
            .filter(|s| s.user_id == user_id && !s.is_expired_at(now))
            .map(|s| s.value().clone())
            .collect()
    }

    /// Remove every session owned by a user, returning how many were removed
    pub fn destroy_user_sessions(&self, user_id: &str) -> usize {
        let mut removed = 0usize;
        self.inner.table.retain(|_, s| {
            let keep = s.user_id != user_id;
            removed += usize::from(!keep);
            keep
        });
        self.inner
            .counters
            .destroyed
            .fetch_add(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            info!(user_id, removed, "User sessions destroyed");
        }
        removed
    }

    /// Evict every expired session now
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep()
    }

    /// Entries currently held, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.inner.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.table.is_empty()
    }

    pub fn stats(&self) -> SessionStoreStats {
        let c = &self.inner.counters;
        SessionStoreStats {
            active: self.inner.table.len(),
            created: c.created.load(Ordering::Relaxed),
            refreshed: c.refreshed.load(Ordering::Relaxed),
            destroyed: c.destroyed.load(Ordering::Relaxed),
            expired: c.expired.load(Ordering::Relaxed),
        }
    }

    /// Whether the background sweep is still running
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop the background sweep and wait for it to exit
    pub async fn shutdown(&self) {
        let tx = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let task = self.sweeper.lock().unwrap_or_else(|e| e.into_inner()).take();

        if let Some(tx) = tx {
            let _ = tx.send(()).await;
        }
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Session sweep ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if let Some(task) = self
            .sweeper
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            task.abort();
        }
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.inner.table.len())
            .field("ttl", &self.inner.ttl)
            .finish_non_exhaustive()
    }
}

async fn sweep_loop(store: Weak<Inner>, period: Duration, mut shutdown: mpsc::Receiver<()>) {
    let period = period.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    debug!(?period, "Session sweep started");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(inner) = store.upgrade() else { break };
                let removed = inner.sweep();
                if removed > 0 {
                    debug!(removed, "Swept expired sessions");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
    debug!("Session sweep stopped");
}
