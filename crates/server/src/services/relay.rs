use axum::http::header::{HeaderValue, RANGE, USER_AGENT};
use feed::{UrlError, UrlGuard, CLIENT_USER_AGENT};
use reqwest::{Client, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid media URL: {0}")]
    InvalidUrl(#[from] UrlError),

    #[error("Failed to build upstream request: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Upstream request to {url} failed: {source}")]
    Upstream {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Streams media from upstream without buffering or retrying
pub struct MediaRelay {
    client: Client,
    guard: UrlGuard,
}

impl MediaRelay {
    /// `client` must not carry a total request timeout or long downloads get cut off.
    pub fn new(client: Client, guard: UrlGuard) -> Self {
        Self { client, guard }
    }

    /// Open the upstream resource.
    ///
    /// The response is returned whatever its status, so the caller can pass
    /// 206 and error statuses through unchanged.
    pub async fn open(
        &self,
        raw_url: &str,
        range: Option<&HeaderValue>,
        user_agent: Option<&HeaderValue>,
    ) -> Result<Response, RelayError> {
        let url = self.guard.validate(raw_url)?;

        let mut request = self.client.get(url.clone());
        if let Some(range) = range {
            request = request.header(RANGE, range.clone());
        }
        request = match user_agent {
            Some(agent) => request.header(USER_AGENT, agent.clone()),
            None => request.header(USER_AGENT, CLIENT_USER_AGENT),
        };
        let request = request.build().map_err(RelayError::Build)?;

        self.client
            .execute(request)
            .await
            .map_err(|source| RelayError::Upstream {
                url: url.to_string(),
                source,
            })
    }
}
