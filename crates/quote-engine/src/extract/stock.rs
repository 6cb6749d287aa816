//! Stock quote payload parsing.
//!
//! The quote endpoint answers with `v_<symbol>="f0~f1~f2~...";` where the
//! fields are positional.

use std::str::FromStr;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

use super::ParseOutcome;

const NO_MATCH_MARKER: &str = "v_pv_none_match";

const NAME_FIELD: usize = 1;
const CODE_FIELD: usize = 2;
const PRICE_FIELD: usize = 3;
const TIMESTAMP_FIELD: usize = 30;

const NON_TRADABLE_SUFFIXES: [&str; 4] = ["退", "退市", "delisted", "halted"];

lazy_static! {
    static ref QUOTE_RECORD: Regex =
        Regex::new(r#"v_([A-Za-z0-9_.]+)="([^"]*)""#).expect("Invalid regex pattern");

    static ref DATE_LIKE: Regex =
        Regex::new(r"^\d{4}[-/.]?\d{1,2}[-/.]?\d{1,2}$").expect("Invalid regex pattern");
}

/// A parsed stock quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockQuote {
    pub symbol: String,
    pub name: String,
    pub code: String,
    pub price: Decimal,
    pub date: NaiveDate,
}

/// Parse a quote payload.
///
/// `NoMatch` means the upstream does not know the symbol. A record that is
/// present but unusable is `Malformed`. A missing or unreadable trade
/// timestamp falls back to `today`.
pub fn parse_stock_payload(payload: &str, today: NaiveDate) -> ParseOutcome<StockQuote> {
    if payload.contains(NO_MATCH_MARKER) {
        return ParseOutcome::NoMatch;
    }

    let Some(caps) = QUOTE_RECORD.captures(payload) else {
        return ParseOutcome::Malformed("no quote record in payload".to_string());
    };
    let symbol = caps[1].to_string();
    let record = &caps[2];

    let fields: Vec<&str> = record.split('~').map(str::trim).collect();
    if record.trim().is_empty() || fields.len() <= PRICE_FIELD {
        return ParseOutcome::NoMatch;
    }

    let name = fields[NAME_FIELD];
    if !is_tradable_name(name) {
        return ParseOutcome::Malformed(format!("unusable security name '{}'", name));
    }

    let price = match Decimal::from_str(fields[PRICE_FIELD]) {
        Ok(price) => price,
        Err(_) => {
            return ParseOutcome::Malformed(format!(
                "price '{}' is not a number",
                fields[PRICE_FIELD]
            ))
        }
    };

    let date = fields
        .get(TIMESTAMP_FIELD)
        .and_then(|raw| parse_trade_date(raw))
        .unwrap_or(today);

    ParseOutcome::Parsed(StockQuote {
        symbol,
        name: name.to_string(),
        code: fields[CODE_FIELD].to_string(),
        price,
        date,
    })
}

/// Whether `name` looks like the name of a tradable security.
///
/// Rejects empty and purely numeric names, names carrying a `%`, names that
/// are a date, and names flagged as delisted or halted.
pub fn is_tradable_name(name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() || name.contains('%') || DATE_LIKE.is_match(name) {
        return false;
    }
    if name.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return false;
    }
    let lower = name.to_lowercase();
    !NON_TRADABLE_SUFFIXES
        .iter()
        .any(|suffix| lower.ends_with(suffix))
}

/// `YYYYMMDD...` or `YYYY-MM-DD ...`.
fn parse_trade_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Some(compact) = raw.get(..8).filter(|s| s.bytes().all(|b| b.is_ascii_digit())) {
        return NaiveDate::parse_from_str(compact, "%Y%m%d").ok();
    }
    raw.get(..10)
        .and_then(|dashed| NaiveDate::parse_from_str(dashed, "%Y-%m-%d").ok())
}
