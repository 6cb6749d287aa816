//! Extraction pipeline for upstream payloads.
//!
//! Fund pages are loosely structured HTML worked through an ordered list of
//! strategies; stock quotes are a positional tilde-delimited record.

mod date;
mod fund;
mod stock;
mod value;

pub use date::find_date;
pub use fund::{
    placeholder_name, ElementTextName, FundPageExtractor, FundSnapshot, KeywordWindowValue,
    NameStrategy, NetValueCandidate, NetValueStrategy, TableValue,
};
pub use stock::{is_tradable_name, parse_stock_payload, StockQuote};
pub use value::{find_net_value, parse_net_value};

/// Result of a single parsing strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome<T> {
    /// The strategy recovered a value.
    Parsed(T),
    /// The payload does not contain what the strategy looks for.
    NoMatch,
    /// The payload looked relevant but could not be used.
    Malformed(String),
}

impl<T> ParseOutcome<T> {
    pub fn parsed(self) -> Option<T> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::NoMatch | Self::Malformed(_) => None,
        }
    }
}
