//! Concurrency limiter for outbound upstream operations.
//!
//! Caps the number of simultaneously running operations; excess work waits
//! in FIFO order (tokio's semaphore is fair).

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use tokio::sync::Semaphore;

use crate::errors::QueryError;

/// Default number of concurrent upstream operations.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// FIFO concurrency gate.
///
/// A task holds its slot for its whole lifetime, so a retried operation
/// occupies one slot across all of its attempts.
pub struct ConcurrencyLimiter {
    semaphore: Semaphore,
    max_concurrent: usize,
    queued: AtomicUsize,
}

/// Decrements the queued counter when a waiter leaves the queue, whether it
/// got a slot or was dropped while waiting.
struct QueueGuard<'a>(&'a AtomicUsize);

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

impl ConcurrencyLimiter {
    /// Create a limiter with `max_concurrent` slots (minimum 1).
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Semaphore::new(max_concurrent),
            max_concurrent,
            queued: AtomicUsize::new(0),
        }
    }

    /// Run `task` once a slot is free.
    ///
    /// The slot is released when the task finishes, successfully or not.
    /// Fails only if the limiter has been closed.
    pub async fn run<F, T>(&self, task: F) -> Result<T, QueryError>
    where
        F: Future<Output = Result<T, QueryError>>,
    {
        let permit = {
            self.queued.fetch_add(1, Ordering::Relaxed);
            let _guard = QueueGuard(&self.queued);
            self.semaphore
                .acquire()
                .await
                .map_err(|_| QueryError::System("Concurrency limiter is closed".to_string()))?
        };

        debug!(
            "Limiter: slot acquired ({}/{} active)",
            self.active(),
            self.max_concurrent
        );
        let result = task.await;
        drop(permit);
        result
    }

    /// Tasks currently holding a slot.
    pub fn active(&self) -> usize {
        self.max_concurrent - self.semaphore.available_permits()
    }

    /// Tasks waiting for a slot.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Reject queued and future tasks. Running tasks finish normally.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}
