//! In-flight request deduplication.
//!
//! Concurrent requests with the same fingerprint share one underlying
//! operation. The registry entry exists only while that operation runs.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};

use crate::errors::QueryError;
use crate::provider::FetchOptions;

type SharedResult<T> = Shared<BoxFuture<'static, Result<T, QueryError>>>;
type Registry<T> = Arc<Mutex<HashMap<String, SharedResult<T>>>>;

/// Identity of an outbound request: the URL plus its options.
pub fn fingerprint(url: &str, options: &FetchOptions) -> String {
    let options = serde_json::to_string(options).unwrap_or_default();
    format!("{:x}", md5::compute(format!("{}\n{}", url, options)))
}

fn lock_registry<T>(
    registry: &Mutex<HashMap<String, SharedResult<T>>>,
) -> MutexGuard<'_, HashMap<String, SharedResult<T>>> {
    registry.lock().unwrap_or_else(|poisoned| {
        warn!("In-flight registry mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Coalesces identical concurrent operations.
pub struct InFlightDeduplicator<T> {
    in_flight: Registry<T>,
}

impl<T> InFlightDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the in-flight operation for `key`, or start one with `operation`.
    ///
    /// Every caller sharing an operation observes the same success or the
    /// same error. The operation runs as its own task, so it completes and
    /// leaves the registry even if every caller stops waiting.
    pub async fn run<F, Fut>(&self, key: &str, operation: F) -> Result<T, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, QueryError>> + Send + 'static,
    {
        let shared = {
            let mut in_flight = lock_registry(&self.in_flight);
            match in_flight.get(key) {
                Some(existing) => {
                    debug!("Dedup: joining in-flight request {}", key);
                    existing.clone()
                }
                None => {
                    let registry = Arc::clone(&self.in_flight);
                    let owned_key = key.to_string();
                    let pending = operation();
                    let handle = tokio::spawn(async move {
                        let result = pending.await;
                        lock_registry(&registry).remove(&owned_key);
                        result
                    });

                    let shared = async move {
                        handle.await.unwrap_or_else(|e| {
                            Err(QueryError::System(format!("In-flight task failed: {}", e)))
                        })
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };

        shared.await
    }

    /// Number of operations currently in flight.
    pub fn pending(&self) -> usize {
        lock_registry(&self.in_flight).len()
    }
}

impl<T> Default for InFlightDeduplicator<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_fingerprint_depends_on_url_and_options() {
        let plain = FetchOptions::new();
        let with_header = FetchOptions::new().header("Referer", "https://example.com");

        assert_eq!(fingerprint("https://a", &plain), fingerprint("https://a", &plain));
        assert_ne!(fingerprint("https://a", &plain), fingerprint("https://b", &plain));
        assert_ne!(
            fingerprint("https://a", &plain),
            fingerprint("https://a", &with_header)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_invocation() {
        let dedup = Arc::new(InFlightDeduplicator::<String>::new());
        let invocations = Arc::new(AtomicUsize::new(0));

        let callers: Vec<_> = (0..5)
            .map(|_| {
                let dedup = dedup.clone();
                let invocations = invocations.clone();
                tokio::spawn(async move {
                    dedup
                        .run("same", || async move {
                            invocations.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok("payload".to_string())
                        })
                        .await
                })
            })
            .collect();

        for caller in callers {
            assert_eq!(caller.await.unwrap().unwrap(), "payload");
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_and_entry_removed() {
        let dedup = Arc::new(InFlightDeduplicator::<u32>::new());

        let first = {
            let dedup = dedup.clone();
            tokio::spawn(async move {
                dedup
                    .run("key", || async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Err(QueryError::NotFound("gone".to_string()))
                    })
                    .await
            })
        };
        while dedup.pending() == 0 {
            tokio::task::yield_now().await;
        }

        let second = dedup.run("key", || async { Ok(1) }).await;
        let first = first.await.unwrap();

        assert_eq!(first, Err(QueryError::NotFound("gone".to_string())));
        assert_eq!(second, first);
        assert_eq!(dedup.pending(), 0);
    }

    #[tokio::test]
    async fn test_sequential_calls_run_separately() {
        let dedup = InFlightDeduplicator::<usize>::new();
        let invocations = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let invocations = invocations.clone();
            dedup
                .run("key", || async move {
                    Ok(invocations.fetch_add(1, Ordering::SeqCst))
                })
                .await
                .unwrap();
        }

        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }
}
