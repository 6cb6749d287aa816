//! Error types and sentinel classification for the quote engine.
//!
//! This module provides:
//! - [`QueryError`]: The error enum for every stage of a price query
//! - [`Sentinel`]: The negative price codes errors are flattened into

mod sentinel;

pub use sentinel::Sentinel;

use std::fmt;

use thiserror::Error;

/// Which resolution path a failure happened on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SourcePath {
    /// Fund lookup, including its stock fallback.
    Fund,
    /// Exchange-listed stock lookup.
    Stock,
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fund => write!(f, "fund"),
            Self::Stock => write!(f, "stock"),
        }
    }
}

/// Errors that can occur while resolving a price query.
///
/// Every variant is cloneable: a single resolution outcome is fanned out to
/// all callers waiting on the same identifier or fingerprint.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The identifier is neither a fund code nor a prefixed ticker.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The as-of date hint is malformed or out of range.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// The upstream could not be reached, answered non-2xx, or timed out
    /// on every attempt.
    #[error("Upstream unavailable: {url} - {message}")]
    UpstreamUnavailable {
        /// The URL that was requested
        url: String,
        /// Transport or status description
        message: String,
    },

    /// The upstream explicitly reported that it has no such security.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A payload arrived but no strategy could recover a usable record.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// A resolution path failed as a whole.
    #[error("{path} resolution failed: {reason}")]
    ResolutionFailed {
        /// The path that failed
        path: SourcePath,
        /// The failure that ended the path
        reason: Box<QueryError>,
    },

    /// Any other fault (dropped channel, panicked task, ...).
    #[error("System error: {0}")]
    System(String),
}

impl QueryError {
    /// Wraps this error as a failure of the given resolution path.
    ///
    /// Errors that are already wrapped keep their original path.
    pub fn on_path(self, path: SourcePath) -> Self {
        match self {
            Self::ResolutionFailed { .. } => self,
            other => Self::ResolutionFailed {
                path,
                reason: Box::new(other),
            },
        }
    }

    /// Returns the sentinel this error is reported as.
    ///
    /// # Examples
    ///
    /// ```
    /// use navquote_engine::errors::{QueryError, Sentinel, SourcePath};
    ///
    /// let error = QueryError::InvalidIdentifier("abc123".to_string());
    /// assert_eq!(error.sentinel(), Sentinel::InvalidIdentifier);
    ///
    /// let error = QueryError::NotFound("sz000001".to_string()).on_path(SourcePath::Stock);
    /// assert_eq!(error.sentinel().code(), -2002);
    /// ```
    pub fn sentinel(&self) -> Sentinel {
        match self {
            Self::InvalidIdentifier(_) => Sentinel::InvalidIdentifier,
            Self::InvalidDate(_) => Sentinel::InvalidDate,
            Self::ResolutionFailed {
                path: SourcePath::Fund,
                ..
            } => Sentinel::FundResolutionFailed,
            Self::ResolutionFailed {
                path: SourcePath::Stock,
                ..
            } => Sentinel::StockResolutionFailed,
            Self::UpstreamUnavailable { .. }
            | Self::NotFound(_)
            | Self::Extraction(_)
            | Self::System(_) => Sentinel::Unclassified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_map_to_input_sentinels() {
        let error = QueryError::InvalidIdentifier("abc123".to_string());
        assert_eq!(error.sentinel(), Sentinel::InvalidIdentifier);

        let error = QueryError::InvalidDate("2024-13-01".to_string());
        assert_eq!(error.sentinel(), Sentinel::InvalidDate);
    }

    #[test]
    fn test_path_decides_resolution_sentinel() {
        let fund = QueryError::Extraction("no name".to_string()).on_path(SourcePath::Fund);
        assert_eq!(fund.sentinel(), Sentinel::FundResolutionFailed);

        let stock = QueryError::NotFound("sh000001".to_string()).on_path(SourcePath::Stock);
        assert_eq!(stock.sentinel(), Sentinel::StockResolutionFailed);
    }

    #[test]
    fn test_on_path_keeps_first_path() {
        let error = QueryError::NotFound("sz000311".to_string())
            .on_path(SourcePath::Stock)
            .on_path(SourcePath::Fund);
        assert_eq!(error.sentinel(), Sentinel::StockResolutionFailed);
    }

    #[test]
    fn test_unwrapped_errors_are_unclassified() {
        let error = QueryError::System("task panicked".to_string());
        assert_eq!(error.sentinel(), Sentinel::Unclassified);

        let error = QueryError::UpstreamUnavailable {
            url: "https://example.test".to_string(),
            message: "HTTP 502".to_string(),
        };
        assert_eq!(error.sentinel(), Sentinel::Unclassified);
    }

    #[test]
    fn test_error_display() {
        let error = QueryError::InvalidIdentifier("abc123".to_string());
        assert_eq!(format!("{}", error), "Invalid identifier: abc123");

        let error = QueryError::NotFound("sh000001".to_string()).on_path(SourcePath::Stock);
        assert_eq!(
            format!("{}", error),
            "stock resolution failed: Not found: sh000001"
        );
    }
}
