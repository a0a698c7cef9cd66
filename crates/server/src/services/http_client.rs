use reqwest::Client;
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Upstream HTTP clients shared by all requests
#[derive(Clone)]
pub struct HttpClients {
    /// Feed requests, bounded by the per-attempt timeout
    pub feed: Client,
    /// Media streams, only the connect phase is bounded
    pub media: Client,
}

impl HttpClients {
    pub fn from_config(config: &Config) -> Result<Self, HttpClientError> {
        let feed = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()?;
        let media = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;

        tracing::debug!(
            timeout_secs = config.request_timeout.as_secs(),
            "HTTP clients initialized"
        );
        Ok(Self { feed, media })
    }
}
