//! Strict net-value validation.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

lazy_static! {
    /// Exact shape of a published net value: up to three integer digits and
    /// exactly four decimals.
    static ref NET_VALUE: Regex = Regex::new(r"^\d{1,3}\.\d{4}$").expect("Invalid regex pattern");

    /// Any decimal-looking token in free text.
    static ref DECIMAL_TOKEN: Regex = Regex::new(r"\d+\.\d+").expect("Invalid regex pattern");
}

const MIN_NET_VALUE: Decimal = Decimal::from_parts(1, 0, 0, false, 4);
const MAX_NET_VALUE: Decimal = Decimal::from_parts(500, 0, 0, false, 0);

/// Parse a net value, rejecting anything outside the published format.
///
/// Values are never coerced: `2.345`, `2.34567` and `1234.5678` are all
/// rejected rather than rounded.
pub fn parse_net_value(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if !NET_VALUE.is_match(raw) {
        return None;
    }
    let value = Decimal::from_str(raw).ok()?;
    (MIN_NET_VALUE..=MAX_NET_VALUE)
        .contains(&value)
        .then_some(value)
}

/// First strictly valid net value among the decimal tokens of `text`.
pub fn find_net_value(text: &str) -> Option<Decimal> {
    DECIMAL_TOKEN
        .find_iter(text)
        .filter(|m| {
            // signed or dotted continuations like "-1.2345" or "1.2.3456"
            !matches!(text[..m.start()].chars().next_back(), Some('-' | '.'))
        })
        .find_map(|m| parse_net_value(m.as_str()))
}
