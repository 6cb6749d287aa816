use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::QueryError;

lazy_static! {
    /// Six ASCII digits: a fund code, or a mainland listing code
    static ref SIX_DIGITS: Regex = Regex::new(r"^[0-9]{6}$").expect("Invalid regex pattern");

    /// Hong Kong listing code
    static ref FIVE_DIGITS: Regex = Regex::new(r"^[0-9]{5}$").expect("Invalid regex pattern");

    /// US ticker, optionally with a share-class suffix (BRK.B)
    static ref US_TICKER: Regex =
        Regex::new(r"^[A-Z][A-Z0-9]{0,9}(\.[A-Z])?$").expect("Invalid regex pattern");
}

/// Exchange prefix understood by the stock upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    /// Shanghai
    Sh,
    /// Shenzhen
    Sz,
    /// Beijing
    Bj,
    /// Hong Kong
    Hk,
    /// United States
    Us,
}

impl Market {
    pub const ALL: [Market; 5] = [Market::Sh, Market::Sz, Market::Bj, Market::Hk, Market::Us];

    /// Two-letter lowercase prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Sh => "sh",
            Self::Sz => "sz",
            Self::Bj => "bj",
            Self::Hk => "hk",
            Self::Us => "us",
        }
    }

    /// Parses a prefix, case-insensitively.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.prefix().eq_ignore_ascii_case(prefix))
    }

    /// The other mainland exchange a digit code may be listed on.
    pub fn alternate(self) -> Option<Self> {
        match self {
            Self::Sh => Some(Self::Sz),
            Self::Sz => Some(Self::Sh),
            Self::Bj | Self::Hk | Self::Us => None,
        }
    }

    /// Default exchange for a bare six-digit code.
    pub fn infer_from_code(code: &str) -> Self {
        match code.as_bytes().first() {
            Some(b'5') | Some(b'6') | Some(b'9') => Self::Sh,
            Some(b'4') | Some(b'8') => Self::Bj,
            _ => Self::Sz,
        }
    }

    fn accepts(self, body: &str) -> bool {
        match self {
            Self::Sh | Self::Sz | Self::Bj => SIX_DIGITS.is_match(body),
            Self::Hk => FIVE_DIGITS.is_match(body),
            Self::Us => US_TICKER.is_match(body),
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A classified, validated security identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SecurityId {
    /// Six-digit code, presumptively a mutual fund.
    Fund { code: String },
    /// Exchange-prefixed ticker.
    Listed { market: Market, code: String },
}

impl SecurityId {
    /// Normalizes and validates a raw identifier.
    ///
    /// Accepts six-digit fund codes and tickers carrying a recognized market
    /// prefix with a body valid for that market.
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let normalized = normalize_identifier(raw);

        if SIX_DIGITS.is_match(&normalized) {
            return Ok(Self::Fund { code: normalized });
        }

        if let Some((prefix, body)) = split_prefix(&normalized) {
            if let Some(market) = Market::from_prefix(prefix) {
                if market.accepts(body) {
                    return Ok(Self::Listed {
                        market,
                        code: body.to_string(),
                    });
                }
            }
        }

        Err(QueryError::InvalidIdentifier(raw.trim().to_string()))
    }

    /// The normalized key this identifier coalesces and caches under.
    pub fn key(&self) -> String {
        match self {
            Self::Fund { code } => code.clone(),
            Self::Listed { market, code } => format!("{}{}", market.prefix(), code),
        }
    }
}

impl fmt::Display for SecurityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Canonicalizes an identifier's case and prefix.
///
/// Six-digit codes are returned unchanged. Prefixed tickers get a lowercase
/// prefix; the body is lowercased too, except for US tickers whose body is
/// uppercased (`USaapl` -> `usAAPL`, `SH600000` -> `sh600000`).
pub fn normalize_identifier(raw: &str) -> String {
    let trimmed = raw.trim();

    if SIX_DIGITS.is_match(trimmed) {
        return trimmed.to_string();
    }

    if let Some((prefix, body)) = split_prefix(trimmed) {
        if let Some(market) = Market::from_prefix(prefix) {
            let body = match market {
                Market::Us => body.to_ascii_uppercase(),
                _ => body.to_ascii_lowercase(),
            };
            return format!("{}{}", market.prefix(), body);
        }
    }

    trimmed.to_lowercase()
}

fn split_prefix(value: &str) -> Option<(&str, &str)> {
    if value.len() > 2 && value.is_char_boundary(2) {
        Some(value.split_at(2))
    } else {
        None
    }
}
