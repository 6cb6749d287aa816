//! Upstream gateway: every outbound request passes through here.
//!
//! A request is looked up in the raw-response cache, then joined with any
//! identical in-flight request, and only then given a limiter slot in which
//! the retry controller drives the fetcher.

mod dedup;
mod limiter;
mod retry;

pub use dedup::{fingerprint, InFlightDeduplicator};
pub use limiter::{ConcurrencyLimiter, DEFAULT_MAX_CONCURRENT};
pub use retry::{RetryPolicy, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY};

use std::sync::Arc;
use std::time::Duration;

use log::debug;

use crate::cache::BoundedTtlCache;
use crate::errors::QueryError;
use crate::provider::{FetchOptions, Fetcher};

/// Raw upstream bodies keyed by request fingerprint.
pub type RawResponseCache = BoundedTtlCache<String, Arc<str>>;

/// Cached, deduplicated, rate-limited and retried access to a [`Fetcher`].
pub struct UpstreamGateway {
    fetcher: Arc<dyn Fetcher>,
    limiter: Arc<ConcurrencyLimiter>,
    retry: RetryPolicy,
    dedup: InFlightDeduplicator<Arc<str>>,
    raw_cache: Arc<RawResponseCache>,
    raw_ttl: Duration,
}

impl UpstreamGateway {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        limiter: Arc<ConcurrencyLimiter>,
        retry: RetryPolicy,
        raw_cache: Arc<RawResponseCache>,
        raw_ttl: Duration,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            retry,
            dedup: InFlightDeduplicator::new(),
            raw_cache,
            raw_ttl,
        }
    }

    /// Fetch the body of `url`.
    ///
    /// Fresh raw-cache entries are returned without touching the network.
    /// Otherwise concurrent callers with the same fingerprint share a single
    /// retried fetch, whose successful body is stored in the raw cache before
    /// it reaches any caller.
    pub async fn fetch_text(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<Arc<str>, QueryError> {
        let key = fingerprint(url, options);

        if let Some(body) = self.raw_cache.get(&key, self.raw_ttl) {
            debug!("Gateway: raw cache hit for {}", url);
            return Ok(body);
        }

        let fetcher = Arc::clone(&self.fetcher);
        let limiter = Arc::clone(&self.limiter);
        let raw_cache = Arc::clone(&self.raw_cache);
        let retry = self.retry.clone();
        let url = url.to_string();
        let options = options.clone();
        let cache_key = key.clone();

        self.dedup
            .run(&key, move || async move {
                let body = limiter
                    .run(retry.execute(&url, || {
                        let fetcher = Arc::clone(&fetcher);
                        let url = url.clone();
                        let options = options.clone();
                        async move { fetcher.fetch(&url, &options).await }
                    }))
                    .await?;

                debug!(
                    "Gateway: {} returned {} bytes via {}",
                    url,
                    body.len(),
                    fetcher.id()
                );
                let body: Arc<str> = Arc::from(body);
                raw_cache.set(cache_key, Arc::clone(&body));
                Ok(body)
            })
            .await
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Requests currently in flight after deduplication.
    pub fn pending(&self) -> usize {
        self.dedup.pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then answers with the URL.
    struct CountingFetcher {
        calls: AtomicUsize,
        failures: usize,
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        fn id(&self) -> &'static str {
            "COUNTING"
        }

        async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<String, QueryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if call < self.failures {
                Err(QueryError::UpstreamUnavailable {
                    url: url.to_string(),
                    message: "HTTP error: 503".to_string(),
                })
            } else {
                Ok(format!("body of {}", url))
            }
        }
    }

    fn gateway(failures: usize) -> (Arc<CountingFetcher>, Arc<ManualClock>, UpstreamGateway) {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            failures,
        });
        let clock = Arc::new(ManualClock::new(
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        ));
        let gateway = UpstreamGateway::new(
            fetcher.clone(),
            Arc::new(ConcurrencyLimiter::new(2)),
            RetryPolicy {
                attempts: 3,
                base_delay: Duration::from_millis(100),
                attempt_timeout: Duration::from_secs(1),
            },
            Arc::new(BoundedTtlCache::new("raw", 16, clock.clone())),
            Duration::from_secs(15),
        );
        (fetcher, clock, gateway)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_identical_requests_fetch_once() {
        let (fetcher, _clock, gateway) = gateway(0);
        let options = FetchOptions::new();

        let results = futures::future::join_all(
            (0..6).map(|_| gateway.fetch_text("https://up.test/q=sz000311", &options)),
        )
        .await;

        for result in results {
            assert_eq!(&*result.unwrap(), "body of https://up.test/q=sz000311");
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_raw_cache_serves_until_ttl() {
        let (fetcher, clock, gateway) = gateway(0);
        let options = FetchOptions::new();

        gateway.fetch_text("https://up.test/a", &options).await.unwrap();
        gateway.fetch_text("https://up.test/a", &options).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(16));
        gateway.fetch_text("https://up.test/a", &options).await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let (fetcher, _clock, gateway) = gateway(2);

        let body = gateway
            .fetch_text("https://up.test/b", &FetchOptions::new())
            .await
            .unwrap();

        assert_eq!(&*body, "body of https://up.test/b");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(gateway.limiter().active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_are_not_cached() {
        let (fetcher, _clock, gateway) = gateway(usize::MAX);

        let error = gateway
            .fetch_text("https://up.test/c", &FetchOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(error, QueryError::UpstreamUnavailable { .. }));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);

        let _ = gateway
            .fetch_text("https://up.test/c", &FetchOptions::new())
            .await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 6);
    }
}
