use std::time::Duration;

use reqwest::header::{HeaderMap, USER_AGENT};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::FetchError;
use crate::link::UrlGuard;
use crate::models::FetchedFeed;

/// Identifier sent upstream with every feed request
pub const CLIENT_USER_AGENT: &str = concat!("podcast-proxy/", env!("CARGO_PKG_VERSION"));

/// Headers that describe the upstream body framing or connection and stop
/// being valid once the body is rewritten.
const HOP_BY_HOP_HEADERS: [&str; 11] = [
    "content-length",
    "transfer-encoding",
    "content-encoding",
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "trailers",
    "upgrade",
];

/// Retry behaviour for upstream feed requests
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// After failed attempt `n`, wait `n * backoff_unit` before the next one
    pub backoff_unit: Duration,
}

impl FetchPolicy {
    /// Wait after failed attempt `attempt`, saturating instead of overflowing
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

/// Upstream feed fetcher with linear backoff
pub struct FeedClient {
    client: Client,
    policy: FetchPolicy,
    guard: UrlGuard,
}

impl FeedClient {
    /// Create a new FeedClient around a shared reqwest Client.
    ///
    /// The per-attempt timeout is whatever `client` was built with.
    pub fn new(client: Client, policy: FetchPolicy, guard: UrlGuard) -> Self {
        Self {
            client,
            policy,
            guard,
        }
    }

    pub fn guard(&self) -> &UrlGuard {
        &self.guard
    }

    /// Fetch a feed, retrying transport failures and non-200 responses.
    ///
    /// # Arguments
    /// * `raw_url` - Absolute http(s) URL of the source feed
    ///
    /// # Returns
    /// The body, the headers safe to forward, and the number of attempts used.
    /// After the last attempt fails, the error from that attempt is returned.
    pub async fn fetch(&self, raw_url: &str) -> crate::Result<FetchedFeed> {
        let url = self.guard.validate(raw_url)?;
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match self.fetch_once(&url, attempt).await {
                Ok(feed) => return Ok(feed),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            if attempt >= max_attempts {
                return Err(error);
            }

            let delay = self.policy.delay_after(attempt);
            tracing::warn!(
                url = %url,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Feed fetch failed, retrying: {}",
                error
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn fetch_once(&self, url: &Url, attempt: u32) -> crate::Result<FetchedFeed> {
        tracing::debug!(url = %url, attempt, "Fetching feed");

        let request = self
            .client
            .get(url.clone())
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .build()
            .map_err(FetchError::Build)?;

        let response =
            self.client
                .execute(request)
                .await
                .map_err(|source| FetchError::Transport {
                    url: url.to_string(),
                    attempts: attempt,
                    source,
                })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                attempts: attempt,
            });
        }

        let headers = forwardable_headers(response.headers());
        let body = response.bytes().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;

        tracing::debug!(url = %url, attempt, bytes = body.len(), "Fetched feed");
        Ok(FetchedFeed {
            body,
            headers,
            attempts: attempt,
        })
    }
}

/// Copy of `headers` without framing and hop-by-hop headers
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
            forwarded.append(name.clone(), value.clone());
        }
    }
    forwarded
}
