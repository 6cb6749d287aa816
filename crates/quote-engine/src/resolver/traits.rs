//! Resolution traits for the quote engine.

use async_trait::async_trait;

use crate::errors::QueryError;
use crate::models::{PriceRecord, SecurityId};

/// Turns a validated identifier into a price record.
///
/// The batch coalescer calls this exactly once per identifier per debounce
/// window and fans the outcome out to every waiter.
#[async_trait]
pub trait PriceResolver: Send + Sync {
    /// Resolve `id` against the upstreams.
    ///
    /// # Returns
    /// * `Ok(record)` - A successful record (its price may still be zero)
    /// * `Err(error)` - Resolution failed; the error carries the path it
    ///   failed on
    async fn resolve(&self, id: &SecurityId) -> Result<PriceRecord, QueryError>;
}
