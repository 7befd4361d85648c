use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use url::Url;

use super::types::WirePage;
use super::{FetchError, RemoteSource};
use crate::store::{ListKey, RemotePage};

const MAX_RETRIES: u32 = 3;
const MAX_PAGE_SIZE: usize = 2 * 1024 * 1024; // 2MB
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for a TMDB-style paged catalog API.
///
/// One instance is shared by every list session; reqwest's client is
/// internally pooled so clones are cheap.
#[derive(Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl CatalogClient {
    pub fn new(client: reqwest::Client, base_url: Url, api_key: Option<SecretString>) -> Self {
        Self {
            client,
            base_url,
            api_key,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-request timeout (configurable via `request_timeout_secs`).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the request URL for one page of a list.
    ///
    /// The API key travels as a query parameter and must never appear in
    /// logs; trace the endpoint path only.
    fn page_url(&self, list: &ListKey, page: i64) -> Result<Url, FetchError> {
        let path = match list {
            ListKey::Upcoming => "movie/upcoming",
            ListKey::TopRated => "movie/top_rated",
            ListKey::NowPlaying => "movie/now_playing",
            ListKey::Popular => "movie/popular",
            ListKey::Search(_) => "search/movie",
        };

        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| FetchError::Decode(format!("invalid endpoint URL: {}", e)))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("page", &page.to_string());
            if let ListKey::Search(query) = list {
                pairs.append_pair("query", query.trim());
            }
            if let Some(key) = &self.api_key {
                pairs.append_pair("api_key", key.expose_secret());
            }
        }

        Ok(url)
    }
}

#[async_trait::async_trait]
impl RemoteSource for CatalogClient {
    async fn fetch_page(&self, list: &ListKey, page: i64) -> Result<RemotePage, FetchError> {
        let url = self.page_url(list, page)?;
        let mut retry_count = 0;

        let bytes = loop {
            let response = tokio::time::timeout(self.timeout, self.client.get(url.clone()).send())
                .await
                .map_err(|_| FetchError::Timeout)?
                .map_err(FetchError::from_reqwest)?;

            // Handle rate limiting with exponential backoff
            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if retry_count >= MAX_RETRIES {
                    return Err(FetchError::RateLimited(MAX_RETRIES));
                }

                let delay_secs = 2u64.pow(retry_count); // 2s, 4s, 8s
                tracing::warn!(
                    list = %list,
                    page = page,
                    retry = retry_count,
                    delay_secs = delay_secs,
                    "Rate limited, backing off"
                );

                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                retry_count += 1;
                continue;
            }

            // Server errors (5xx) retry with the same backoff
            if response.status().is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(FetchError::Server(response.status().as_u16()));
                }

                let delay_secs = 2u64.pow(retry_count); // 2s, 4s, 8s
                tracing::warn!(
                    list = %list,
                    page = page,
                    status = %response.status(),
                    retry = retry_count,
                    delay_secs = delay_secs,
                    "Server error, retrying after delay"
                );

                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                retry_count += 1;
                continue;
            }

            // Other non-success statuses (4xx) fail immediately
            if !response.status().is_success() {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }

            // Read response body with size limit and completeness check
            match read_limited_bytes(response, MAX_PAGE_SIZE).await {
                Ok(bytes) => break bytes,
                Err(FetchError::IncompleteResponse { expected, received }) => {
                    if retry_count >= MAX_RETRIES {
                        return Err(FetchError::IncompleteResponse { expected, received });
                    }

                    let delay_secs = 2u64.pow(retry_count); // 2s, 4s, 8s
                    tracing::debug!(
                        list = %list,
                        page = page,
                        expected = expected,
                        received = received,
                        delay_secs = delay_secs,
                        "Retrying incomplete download"
                    );

                    tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }
        };

        let wire: WirePage =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

        tracing::debug!(
            list = %list,
            page = wire.page,
            total_pages = wire.total_pages,
            titles = wire.results.len(),
            "Fetched catalog page"
        );

        Ok(wire.into_remote_page())
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::from_reqwest)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    // A short read means the connection dropped mid-body; callers retry.
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
