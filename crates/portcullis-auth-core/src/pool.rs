//! Bounded pool for CPU-heavy work
//!
//! Password hashing is deliberately expensive. Running it on the async
//! executor would stall unrelated requests, and running it unbounded on the
//! blocking pool would let a burst of logins exhaust memory (each Argon2
//! derivation allocates `memory_cost_kb`). Jobs here run on Tokio's blocking
//! threads, at most `capacity` at a time; the rest wait for a permit.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

/// Errors from dispatching a job
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// Pool was closed before the job got a permit
    #[error("hashing pool is closed")]
    Closed,

    /// Job panicked or was cancelled by the runtime
    #[error("hashing job failed: {0}")]
    JobFailed(String),
}

/// Semaphore-bounded dispatcher onto `spawn_blocking`
#[derive(Clone)]
pub struct HashingPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl HashingPool {
    /// Create a pool running at most `capacity` jobs at once (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Size the pool to the machine's available parallelism
    pub fn with_available_parallelism() -> Self {
        let capacity = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(capacity)
    }

    /// Run a blocking job once a permit is free
    pub async fn run<F, T>(&self, job: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| {
            debug!("Hashing job did not complete: {}", e);
            PoolError::JobFailed(e.to_string())
        })
    }

    /// Maximum concurrent jobs
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held by a running job
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stop accepting jobs; waiting and future callers get `PoolError::Closed`
    pub fn close(&self) {
        self.permits.close();
    }
}

impl std::fmt::Debug for HashingPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashingPool")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}
