//! reqwest-backed fetcher.
//!
//! Character-set decoding is left to reqwest, which honors the charset in
//! the response `Content-Type` (GBK fund pages included).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Client;
use tracing::{debug, warn};

use crate::errors::QueryError;
use crate::provider::headers::default_headers;
use crate::provider::{FetchOptions, Fetcher};

const FETCHER_ID: &str = "HTTP";

/// Transport-level timeout; the retry controller enforces its own, shorter,
/// per-attempt deadline on top.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP fetcher for the fund pages and the quote endpoint.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with browser-like default headers.
    pub fn new() -> Result<Self, QueryError> {
        let client = Client::builder()
            .default_headers(default_headers())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| QueryError::System(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn unavailable(url: &str, message: impl Into<String>) -> QueryError {
        QueryError::UpstreamUnavailable {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn id(&self) -> &'static str {
        FETCHER_ID
    }

    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String, QueryError> {
        let mut request = self.client.get(url);
        for (name, value) in &options.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => request = request.header(name, value),
                _ => warn!("Skipping invalid request header '{}'", name),
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::unavailable(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::unavailable(url, format!("HTTP error: {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Self::unavailable(url, e.to_string()))?;

        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
