//! Quote engine models
//!
//! This module contains the core data types for price queries:
//! - `identifier` - Identifier normalization and classification (SecurityId, Market)
//! - `record` - Caller-facing price record (PriceRecord, RecordStatus)
//! - `request` - Inbound query with its date hint (QueryRequest)

mod identifier;
mod record;
mod request;

pub use identifier::{normalize_identifier, Market, SecurityId};
pub use record::{PriceRecord, RecordStatus, UNAVAILABLE_SUFFIX};
pub use request::QueryRequest;
