mod client;
mod types;

use async_trait::async_trait;
use thiserror::Error;

use crate::store::{ListKey, RemotePage};

pub use client::CatalogClient;

/// Errors that can occur while fetching a catalog page.
///
/// Connectivity failures are split into `Offline` (no route to the server)
/// and `Network` (everything else transport-level) so the presentation layer
/// can offer a "use cached data" affordance for the former.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No network connectivity (DNS resolution or connection refused/unreachable)
    #[error("No internet connection")]
    Offline(#[source] reqwest::Error),
    /// Other network-level error (TLS, protocol, body read, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the per-request timeout
    #[error("Request timed out")]
    Timeout,
    /// Server-side failure (5xx) after retries were exhausted
    #[error("Server error: status {0}")]
    Server(u16),
    /// Other non-2xx HTTP response
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Server returned 429 Too Many Requests after max retries
    #[error("Rate limited after {0} retries")]
    RateLimited(u32),
    /// Response body was not a valid catalog page
    #[error("Decode error: {0}")]
    Decode(String),
    /// Response body exceeded the size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

impl FetchError {
    /// Classify a transport error, distinguishing offline conditions.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Offline(err)
        } else {
            FetchError::Network(err)
        }
    }

    /// Returns true if this error is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Offline(_)
            | FetchError::Network(_)
            | FetchError::Timeout
            | FetchError::Server(_)
            | FetchError::RateLimited(_)
            | FetchError::IncompleteResponse { .. } => true,
            FetchError::HttpStatus(_) | FetchError::Decode(_) | FetchError::ResponseTooLarge => {
                false
            }
        }
    }
}

/// Remote paginated catalog endpoint.
///
/// The paging session only ever asks for one page of one list; pagination
/// bookkeeping lives in the store, not behind this seam.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch one page of a logical list. Page tokens start at 1.
    async fn fetch_page(&self, list: &ListKey, page: i64) -> Result<RemotePage, FetchError>;
}
