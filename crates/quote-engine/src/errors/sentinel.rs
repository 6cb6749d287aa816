use rust_decimal::Decimal;

/// Negative price codes that encode a failure inside a normal-shaped record.
///
/// The numeric values are part of the caller-facing contract and must not
/// change.
///
/// | Sentinel | Code | Meaning |
/// |----------|------|---------|
/// | `InvalidIdentifier` | -1001 | identifier failed shape validation |
/// | `InvalidDate` | -1002 | as-of date hint malformed or out of range |
/// | `FundResolutionFailed` | -2001 | fund lookup and its stock fallback failed |
/// | `StockResolutionFailed` | -2002 | stock lookup failed |
/// | `Unclassified` | -9999 | any other fault |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sentinel {
    InvalidIdentifier,
    InvalidDate,
    FundResolutionFailed,
    StockResolutionFailed,
    Unclassified,
}

impl Sentinel {
    /// The integer code carried in the price field.
    pub fn code(self) -> i64 {
        match self {
            Self::InvalidIdentifier => -1001,
            Self::InvalidDate => -1002,
            Self::FundResolutionFailed => -2001,
            Self::StockResolutionFailed => -2002,
            Self::Unclassified => -9999,
        }
    }

    /// The code as a price value.
    pub fn price(self) -> Decimal {
        Decimal::from(self.code())
    }
}
