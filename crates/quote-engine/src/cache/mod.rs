//! In-memory caches.
//!
//! Two logical caches share [`BoundedTtlCache`]: raw upstream responses keyed
//! by request fingerprint (short TTL) and resolved price records keyed by
//! normalized identifier (long TTL).

mod ttl_cache;

pub use ttl_cache::{BoundedTtlCache, CacheStats};
