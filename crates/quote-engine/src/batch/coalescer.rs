//! Debounced batch coalescer.
//!
//! Queries arriving within one debounce window are grouped by normalized
//! identifier. When the window closes each identifier is resolved once and
//! the outcome is delivered to every query that asked for it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use log::{debug, warn};
use tokio::sync::oneshot;

use crate::cache::BoundedTtlCache;
use crate::errors::QueryError;
use crate::models::{PriceRecord, SecurityId};
use crate::resolver::PriceResolver;

/// Default debounce window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(20);

/// Resolved records keyed by normalized identifier.
pub type ResultCache = BoundedTtlCache<String, PriceRecord>;

type Outcome = Result<PriceRecord, QueryError>;

/// Queries waiting for the current window to close.
#[derive(Default)]
struct BatchWindow {
    waiters: HashMap<String, PendingKey>,
    timer_armed: bool,
}

struct PendingKey {
    id: SecurityId,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

struct CoalescerInner {
    resolver: Arc<dyn PriceResolver>,
    result_cache: Arc<ResultCache>,
    result_ttl: Duration,
    debounce: Duration,
    window: Mutex<BatchWindow>,
}

/// Groups identical queries into a single resolution.
#[derive(Clone)]
pub struct BatchCoalescer {
    inner: Arc<CoalescerInner>,
}

impl BatchCoalescer {
    pub fn new(
        resolver: Arc<dyn PriceResolver>,
        result_cache: Arc<ResultCache>,
        result_ttl: Duration,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(CoalescerInner {
                resolver,
                result_cache,
                result_ttl,
                debounce,
                window: Mutex::new(BatchWindow::default()),
            }),
        }
    }

    /// Queue a query for `id` and wait for its window to be resolved.
    ///
    /// The first query of a window arms the debounce timer; later queries
    /// for the same identifier join its waiter list.
    pub async fn add_query(&self, id: &SecurityId) -> Result<PriceRecord, QueryError> {
        let (sender, receiver) = oneshot::channel();

        let arm_timer = {
            let mut window = self.inner.lock_window();
            window
                .waiters
                .entry(id.key())
                .or_insert_with(|| PendingKey {
                    id: id.clone(),
                    waiters: Vec::new(),
                })
                .waiters
                .push(sender);
            !std::mem::replace(&mut window.timer_armed, true)
        };

        if arm_timer {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                tokio::time::sleep(inner.debounce).await;
                inner.flush().await;
            });
        }

        receiver
            .await
            .map_err(|_| QueryError::System(format!("Batch for {} was dropped", id)))?
    }

    /// Identifiers waiting in the current window.
    pub fn pending_keys(&self) -> usize {
        self.inner.lock_window().waiters.len()
    }
}

impl CoalescerInner {
    fn lock_window(&self) -> MutexGuard<'_, BatchWindow> {
        self.window.lock().unwrap_or_else(|poisoned| {
            warn!("Batch window mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Detach the current window and resolve each of its identifiers.
    async fn flush(&self) {
        let batch = {
            let mut window = self.lock_window();
            window.timer_armed = false;
            std::mem::take(&mut window.waiters)
        };

        debug!("Coalescer: dispatching {} identifiers", batch.len());

        join_all(batch.into_iter().map(|(key, pending)| async move {
            let outcome = self.resolve_key(&key, &pending.id).await;
            debug!(
                "Coalescer: {} resolved for {} waiters",
                key,
                pending.waiters.len()
            );
            for waiter in pending.waiters {
                // the caller may have stopped waiting
                let _ = waiter.send(outcome.clone());
            }
        }))
        .await;
    }

    async fn resolve_key(&self, key: &str, id: &SecurityId) -> Outcome {
        let key = key.to_string();
        if let Some(record) = self.result_cache.get(&key, self.result_ttl) {
            debug!("Coalescer: result cache hit for {}", key);
            return Ok(record);
        }

        let outcome = self.resolver.resolve(id).await;
        if let Ok(record) = &outcome {
            self.result_cache.set(key, record.clone());
        }
        outcome
    }
}
