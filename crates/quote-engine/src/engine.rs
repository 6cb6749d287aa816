//! The engine aggregate: owns every cache, the limiter, the gateway, the
//! coalescer and the periodic sweep, and turns requests into records.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::batch::{BatchCoalescer, ResultCache};
use crate::cache::{BoundedTtlCache, CacheStats};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::gateway::{ConcurrencyLimiter, RawResponseCache, UpstreamGateway};
use crate::models::{normalize_identifier, PriceRecord, QueryRequest, SecurityId};
use crate::provider::Fetcher;
use crate::resolver::SourceResolver;

/// Point-in-time counters across the engine's components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    pub raw_cache: CacheStats,
    pub result_cache: CacheStats,
    /// Upstream requests holding a limiter slot
    pub active_requests: usize,
    /// Upstream requests waiting for a slot
    pub queued_requests: usize,
    /// Distinct upstream requests in flight after deduplication
    pub pending_fetches: usize,
    /// Identifiers collected in the open batch window
    pub pending_queries: usize,
}

/// Price query engine.
///
/// Construct one per process (or per upstream configuration), call
/// [`init`](Self::init) from within a tokio runtime, and
/// [`shutdown`](Self::shutdown) when done.
pub struct Engine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    raw_cache: Arc<RawResponseCache>,
    result_cache: Arc<ResultCache>,
    limiter: Arc<ConcurrencyLimiter>,
    gateway: Arc<UpstreamGateway>,
    coalescer: BatchCoalescer,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(config: EngineConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_clock(config, fetcher, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: EngineConfig,
        fetcher: Arc<dyn Fetcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let raw_cache = Arc::new(BoundedTtlCache::new(
            "raw-response",
            config.raw_cache_capacity,
            Arc::clone(&clock),
        ));
        let result_cache = Arc::new(BoundedTtlCache::new(
            "resolved-result",
            config.result_cache_capacity,
            Arc::clone(&clock),
        ));
        let limiter = Arc::new(ConcurrencyLimiter::new(config.max_concurrent));

        let gateway = Arc::new(UpstreamGateway::new(
            fetcher,
            Arc::clone(&limiter),
            config.retry.clone(),
            Arc::clone(&raw_cache),
            config.raw_cache_ttl,
        ));
        let resolver = Arc::new(SourceResolver::new(
            Arc::clone(&gateway),
            config.endpoints.clone(),
            Arc::clone(&clock),
        ));
        let coalescer = BatchCoalescer::new(
            resolver,
            Arc::clone(&result_cache),
            config.result_cache_ttl,
            config.debounce,
        );

        Self {
            config,
            clock,
            raw_cache,
            result_cache,
            limiter,
            gateway,
            coalescer,
            sweeper: Mutex::new(None),
        }
    }

    fn lock_sweeper(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sweeper.lock().unwrap_or_else(|poisoned| {
            warn!("Sweeper mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Start the periodic expired-entry sweep. Calling it again is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(&self) {
        let mut sweeper = self.lock_sweeper();
        if sweeper.is_some() {
            return;
        }

        let raw_cache = Arc::clone(&self.raw_cache);
        let result_cache = Arc::clone(&self.result_cache);
        let raw_ttl = self.config.raw_cache_ttl;
        let result_ttl = self.config.result_cache_ttl;
        let period = self.config.sweep_interval.max(Duration::from_millis(1));

        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let raw = raw_cache.cleanup(raw_ttl);
                let results = result_cache.cleanup(result_ttl);
                if raw + results > 0 {
                    debug!("Sweep removed {} raw and {} resolved entries", raw, results);
                }
            }
        }));

        info!(
            "Quote engine started (max {} concurrent requests, sweep every {:?})",
            self.limiter.max_concurrent(),
            period
        );
    }

    /// Stop the sweep, refuse further upstream work and drop cached data.
    pub fn shutdown(&self) {
        if let Some(handle) = self.lock_sweeper().take() {
            handle.abort();
        }
        self.limiter.close();
        self.raw_cache.clear();
        self.result_cache.clear();
        info!("Quote engine shut down");
    }

    /// Resolve one request into a record.
    ///
    /// Never fails: invalid input and resolution errors come back as
    /// failure records carrying a negative sentinel price.
    pub async fn query(&self, request: &QueryRequest) -> PriceRecord {
        let today = self.clock.today();

        let id = match SecurityId::parse(&request.identifier) {
            Ok(id) => id,
            Err(e) => {
                debug!("Rejected identifier '{}': {}", request.identifier, e);
                return PriceRecord::failure(normalize_identifier(&request.identifier), &e, today);
            }
        };

        let as_of = match request.validated_date(today) {
            Ok(date) => date,
            Err(e) => {
                debug!("Rejected date hint for {}: {}", id, e);
                return PriceRecord::failure(id.key(), &e, today);
            }
        };

        match self.coalescer.add_query(&id).await {
            Ok(record) => record.normalize_price(),
            Err(e) => {
                warn!("Query for {} failed: {}", id, e);
                PriceRecord::failure(id.key(), &e, as_of)
            }
        }
    }

    /// Resolve several requests concurrently; records come back in request
    /// order.
    pub async fn query_many(&self, requests: &[QueryRequest]) -> Vec<PriceRecord> {
        join_all(requests.iter().map(|request| self.query(request))).await
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            raw_cache: self.raw_cache.stats(),
            result_cache: self.result_cache.stats(),
            active_requests: self.limiter.active(),
            queued_requests: self.limiter.queued(),
            pending_fetches: self.gateway.pending(),
            pending_queries: self.coalescer.pending_keys(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_sweeper().take() {
            handle.abort();
        }
    }
}
