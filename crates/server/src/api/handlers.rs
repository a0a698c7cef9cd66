mod feeds;
mod proxy;
mod system;

use serde::Deserialize;
use utoipa::IntoParams;

/// Query parameters shared by the feed and proxy endpoints
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UrlQuery {
    /// Absolute http(s) URL of the upstream resource
    pub url: Option<String>,
    /// API key, alternatively sent as `Authorization: Bearer`
    pub apikey: Option<String>,
}

impl UrlQuery {
    /// The trimmed `url` parameter, or a 400 if it is missing
    fn require_url(&self) -> crate::AppResult<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| crate::AppError::bad_request("Missing 'url' query parameter"))
    }
}

// Re-export all handlers
pub use feeds::get_feed;
pub use proxy::{relay_media, relay_media_kind};
pub use system::{health, index, HealthResponse};

// Re-export utoipa path structs for OpenAPI routing
#[doc(hidden)]
pub use feeds::__path_get_feed;
#[doc(hidden)]
pub use proxy::{__path_relay_media, __path_relay_media_kind};
#[doc(hidden)]
pub use system::{__path_health, __path_index};
