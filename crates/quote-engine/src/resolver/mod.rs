//! Source resolution for price queries.
//!
//! Classifies an identifier and walks the fallback chain across the two
//! upstreams:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       SourceResolver                          │
//! │                                                               │
//! │  six-digit code                    prefixed ticker            │
//! │  ┌──────────────────────────┐      ┌───────────────────────┐  │
//! │  │ 1. Fund page             │      │ Quote endpoint         │  │
//! │  │    accept iff real name  │      │ under its own prefix,  │  │
//! │  │    and net value > 0     │      │ sh <-> sz on no-match  │  │
//! │  └──────────────────────────┘      └───────────────────────┘  │
//! │              │ rejected / error                                │
//! │              ▼                                                 │
//! │  ┌──────────────────────────┐                                  │
//! │  │ 2. Quote endpoint        │                                  │
//! │  │    inferred prefix, then │                                  │
//! │  │    sh <-> sz on no-match │                                  │
//! │  └──────────────────────────┘                                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Errors leave the resolver tagged with the path they belong to, so a
//! digit code whose fund and stock lookups both failed reports as a fund
//! failure.

mod endpoints;
mod source;
mod traits;

pub use endpoints::{UpstreamEndpoints, DEFAULT_FUND_URL, DEFAULT_STOCK_URL};
pub use source::{stock_candidates, SourceResolver};
pub use traits::PriceResolver;
