use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{QueryError, Sentinel};

/// Suffix appended to the name of a record whose price is not usable.
pub const UNAVAILABLE_SUFFIX: &str = " (unavailable)";

/// Outcome flag carried by every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Success,
    Failure,
}

/// Price record returned to callers.
///
/// A failure is still a well-formed record: the price carries a negative
/// [`Sentinel`] code and the name explains what went wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    /// Normalized identifier the query was made for
    pub id: String,

    /// Upstream symbol the price came from (e.g. "sz000311")
    pub symbol: String,

    /// Security name, or an error explanation for failures
    pub name: String,

    /// Price; `None` when the security was found but has no usable price
    pub price: Option<Decimal>,

    /// As-of date; `None` when no date could be resolved
    pub date: Option<NaiveDate>,

    pub status: RecordStatus,
}

impl PriceRecord {
    /// Create a successful record.
    pub fn success(
        id: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        date: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            price: Some(price),
            date,
            status: RecordStatus::Success,
        }
    }

    /// Create a failure record carrying the error's sentinel.
    pub fn failure(id: impl Into<String>, error: &QueryError, date: NaiveDate) -> Self {
        let id = id.into();
        let sentinel: Sentinel = error.sentinel();
        Self {
            symbol: id.clone(),
            id,
            name: error.to_string(),
            price: Some(sentinel.price()),
            date: Some(date),
            status: RecordStatus::Failure,
        }
    }

    /// Replaces a non-positive price with `None` and marks the name.
    ///
    /// Failure records are returned unchanged: their negative price is a
    /// sentinel, not a quote.
    pub fn normalize_price(mut self) -> Self {
        if self.status == RecordStatus::Failure {
            return self;
        }
        if matches!(self.price, Some(p) if p <= Decimal::ZERO) {
            self.price = None;
            if !self.name.ends_with(UNAVAILABLE_SUFFIX) {
                self.name.push_str(UNAVAILABLE_SUFFIX);
            }
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }
}
