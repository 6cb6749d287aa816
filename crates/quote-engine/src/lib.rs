//! navquote quote engine
//!
//! Resolves a fund code or exchange-prefixed ticker to a price record by
//! scraping loosely structured upstream pages, while bounding latency and
//! upstream load.
//!
//! # Overview
//!
//! The engine supports:
//! - Six-digit mutual fund codes, resolved from the fund page with a stock
//!   fallback
//! - Exchange-prefixed tickers (`sh`, `sz`, `bj`, `hk`, `us`) with a single
//!   `sh`/`sz` fallback on no-match
//! - Debounced batching, in-flight deduplication, bounded concurrency and
//!   exponential-backoff retries around every upstream request
//! - Two bounded TTL caches: raw responses and resolved records
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |  Engine::query   |  (validation, sentinel flattening)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! |  BatchCoalescer  | --> |   result cache   |  (long TTL)
//! +------------------+     +------------------+
//!          | miss
//!          v
//! +------------------+     +------------------+
//! |  SourceResolver  | --> |    extraction    |  (fund page / quote record)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! | UpstreamGateway  | --> |    raw cache     |  (short TTL)
//! +------------------+     +------------------+
//!          | miss
//!          v
//!   dedup -> limiter -> retry -> Fetcher
//! ```
//!
//! # Core Types
//!
//! - [`Engine`] - Owns all state; `init`, `query`, `query_many`, `shutdown`
//! - [`QueryRequest`] - Identifier plus optional as-of date hint
//! - [`PriceRecord`] - Always returned; failures carry a negative [`Sentinel`]
//! - [`Fetcher`] - The only network seam, implemented by [`HttpFetcher`]
//! - [`EngineConfig`] - Tunables, with `NAVQUOTE_*` environment overrides

pub mod batch;
pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod extract;
pub mod gateway;
pub mod models;
pub mod provider;
pub mod resolver;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{Engine, EngineStats};
pub use errors::{QueryError, Sentinel, SourcePath};
pub use models::{Market, PriceRecord, QueryRequest, RecordStatus, SecurityId};
pub use provider::{FetchOptions, Fetcher, HttpFetcher};
pub use resolver::UpstreamEndpoints;
