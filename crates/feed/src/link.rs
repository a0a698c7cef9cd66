//! Target URL validation and proxied link construction.

use url::form_urlencoded::byte_serialize;
use url::Url;

use crate::error::UrlError;
use crate::models::{ProxyContext, TargetKind};

/// Query parameter carrying the original URL on proxied links
pub const URL_PARAM: &str = "url";

/// Query parameter carrying the access token on proxied links
pub const AUTH_PARAM: &str = "apikey";

/// Hostname fragments that are refused outright.
///
/// This is a literal substring check on the hostname. It does not resolve DNS,
/// so a public name that resolves to a loopback address still passes.
const BLOCKED_HOST_FRAGMENTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

/// Validates URLs before any outbound request is made.
#[derive(Debug, Clone, Default)]
pub struct UrlGuard {
    allowed_hosts: Vec<String>,
}

impl UrlGuard {
    /// Create a guard. An empty allow-list permits every non-loopback host.
    pub fn new(allowed_hosts: Vec<String>) -> Self {
        let allowed_hosts = allowed_hosts
            .into_iter()
            .map(|h| h.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { allowed_hosts }
    }

    /// Parse and check a URL for scheme, host, loopback and allow-list rules.
    pub fn validate(&self, raw: &str) -> Result<Url, UrlError> {
        let url = Url::parse(raw.trim()).map_err(|source| UrlError::Parse {
            url: raw.to_string(),
            source,
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(UrlError::Scheme(other.to_string())),
        }

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_ascii_lowercase(),
            _ => return Err(UrlError::MissingHost),
        };

        if BLOCKED_HOST_FRAGMENTS.iter().any(|f| host.contains(f)) {
            return Err(UrlError::Loopback(host));
        }

        if !self.allowed_hosts.is_empty() && !self.is_allowed(&host) {
            return Err(UrlError::NotAllowed(host));
        }

        Ok(url)
    }

    fn is_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.iter().any(|allowed| {
            host == allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

/// Canonical string form of a URL, used for cache fingerprints.
///
/// Scheme and host are lowercased, default ports dropped and the fragment removed.
pub fn normalize_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

/// Build `scheme://host/<kind-path>?url=<original>&apikey=<token>`.
///
/// The original is form-encoded as-is, so decoding the `url` parameter yields the
/// exact input string, embedded query included.
pub fn build_proxy_url(ctx: &ProxyContext, original: &str, kind: TargetKind) -> String {
    let encoded_url: String = byte_serialize(original.as_bytes()).collect();
    let encoded_token: String = byte_serialize(ctx.auth_token.as_bytes()).collect();
    format!(
        "{}/{}?{}={}&{}={}",
        ctx.base(),
        kind.path(),
        URL_PARAM,
        encoded_url,
        AUTH_PARAM,
        encoded_token
    )
}
