use std::fmt;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::Deserialize;

/// What kind of resource a rewritten link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Audio,
    Image,
}

impl TargetKind {
    /// Path segment (without leading slash) that relays this kind of target
    pub fn path(&self) -> &'static str {
        match self {
            TargetKind::Audio => "proxy/audio",
            TargetKind::Image => "proxy/image",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Audio => "audio",
            TargetKind::Image => "image",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request information needed to point rewritten links back at this server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyContext {
    /// `http` or `https`, as seen by the client
    pub scheme: String,
    /// Host (and port, if any) the client used to reach us
    pub host: String,
    /// Token appended to every rewritten link
    pub auth_token: String,
}

impl ProxyContext {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            auth_token: auth_token.into(),
        }
    }

    /// Public base URL, e.g. `https://proxy.example.com`
    pub fn base(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

/// A successfully fetched upstream feed
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    /// Raw response body
    pub body: Bytes,
    /// Upstream headers that remain valid after the body is rewritten
    pub headers: HeaderMap,
    /// Attempts used, including the successful one
    pub attempts: u32,
}
