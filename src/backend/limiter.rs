//! Per-backend concurrency limiting.
//!
//! # Responsibilities
//! - Bound the number of in-flight requests to one backend
//! - Queue excess requests instead of rejecting them
//! - Release permits on every exit path (RAII)

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting permit pool for one backend. A limit of 0 disables limiting.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Option<Arc<Semaphore>>,
    limit: usize,
}

impl ConcurrencyLimiter {
    pub fn new(limit: usize) -> Self {
        let semaphore = (limit > 0).then(|| Arc::new(Semaphore::new(limit)));
        Self { semaphore, limit }
    }

    /// Wait for a permit. The permit is returned to the pool when dropped,
    /// including when the owning task is aborted.
    pub async fn acquire(&self) -> LimiterPermit {
        let permit = match &self.semaphore {
            // Never closed; a failed acquire degrades to unlimited.
            Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
            None => None,
        };
        LimiterPermit { _permit: permit }
    }

    /// Configured limit (0 = unlimited).
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        match &self.semaphore {
            Some(semaphore) => self.limit - semaphore.available_permits(),
            None => 0,
        }
    }
}

/// A held permit; dropping it releases the slot.
#[derive(Debug)]
pub struct LimiterPermit {
    _permit: Option<OwnedSemaphorePermit>,
}
