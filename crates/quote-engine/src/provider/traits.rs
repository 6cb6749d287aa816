//! Upstream fetcher trait definitions.
//!
//! This module defines the `Fetcher` trait, the only capability the engine
//! needs from the network: turn a URL plus options into response text.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::errors::QueryError;

/// Per-request options sent alongside a URL.
///
/// Options are part of the request fingerprint, so two requests for the same
/// URL with different headers are fetched independently. A `BTreeMap` keeps
/// serialization order stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FetchOptions {
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Trait for upstream text fetchers.
///
/// Implementations perform exactly one request per call. Retries,
/// concurrency limits, deduplication and caching are layered on top by the
/// [`UpstreamGateway`](crate::gateway::UpstreamGateway).
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use navquote_engine::errors::QueryError;
/// use navquote_engine::provider::{FetchOptions, Fetcher};
///
/// struct StaticFetcher(String);
///
/// #[async_trait]
/// impl Fetcher for StaticFetcher {
///     fn id(&self) -> &'static str {
///         "STATIC"
///     }
///
///     async fn fetch(&self, _url: &str, _options: &FetchOptions) -> Result<String, QueryError> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &'static str;

    /// Fetch the body of `url` as text.
    ///
    /// # Returns
    ///
    /// The response text on a 2xx answer, or
    /// [`QueryError::UpstreamUnavailable`] for transport failures and non-2xx
    /// statuses.
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String, QueryError>;
}
