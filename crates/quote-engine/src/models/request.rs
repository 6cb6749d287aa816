use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::QueryError;

/// Earliest as-of date a caller may ask about.
const MIN_HINT_YEAR: i32 = 2000;

/// Inbound price query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Fund code or exchange-prefixed ticker
    pub identifier: String,

    /// Caller-side as-of date (`YYYY-MM-DD` or `YYYYMMDD`). Validated but
    /// does not change what is fetched. Empty means today.
    #[serde(default)]
    pub as_of_date_hint: String,
}

impl QueryRequest {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            as_of_date_hint: String::new(),
        }
    }

    pub fn with_date_hint(mut self, hint: impl Into<String>) -> Self {
        self.as_of_date_hint = hint.into();
        self
    }

    /// Validates the date hint against `today`.
    pub fn validated_date(&self, today: NaiveDate) -> Result<NaiveDate, QueryError> {
        let hint = self.as_of_date_hint.trim();
        if hint.is_empty() {
            return Ok(today);
        }

        let date = NaiveDate::parse_from_str(hint, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(hint, "%Y%m%d"))
            .map_err(|_| QueryError::InvalidDate(format!("'{}' is not a calendar date", hint)))?;

        if date.year() < MIN_HINT_YEAR {
            return Err(QueryError::InvalidDate(format!(
                "{} is before {}",
                date, MIN_HINT_YEAR
            )));
        }
        if date > today {
            return Err(QueryError::InvalidDate(format!("{} is in the future", date)));
        }
        Ok(date)
    }
}
