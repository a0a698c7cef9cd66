use thiserror::Error;

/// Rejection reasons for a source or relay target URL.
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Invalid URL '{url}': {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported URL scheme '{0}', only http and https are allowed")]
    Scheme(String),

    #[error("URL has no host")]
    MissingHost,

    #[error("Host '{0}' points at the local machine")]
    Loopback(String),

    #[error("Host '{0}' is not in the allowed host list")]
    NotAllowed(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlError),

    #[error("Failed to build request: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Request to {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Upstream {url} returned HTTP {status} after {attempts} attempt(s)")]
    Status {
        url: String,
        status: u16,
        attempts: u32,
    },

    #[error("Failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Only network failures and unexpected statuses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Status { .. })
    }

    /// Number of attempts made before this error surfaced, if any were made.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Transport { attempts, .. } | Self::Status { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("XML parse error at byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("Malformed attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Failed to decode XML content: {0}")]
    Decode(#[from] quick_xml::Error),

    #[error("Invalid UTF-8 in XML document: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Failed to write rewritten XML: {0}")]
    Write(#[from] std::io::Error),

    #[error("Document ended while <{0}> was still open")]
    Truncated(String),

    #[error("Document has no root element")]
    NoRootElement,
}
