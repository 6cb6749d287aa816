//! Upstream fetcher abstraction and the HTTP implementation.
//!
//! The engine talks to the network only through the [`Fetcher`] trait, which
//! keeps the concrete upstream out of the coordination logic and lets tests
//! script responses.

mod headers;
mod http;
mod traits;

pub use http::HttpFetcher;
pub use traits::{FetchOptions, Fetcher};
