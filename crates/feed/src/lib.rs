mod client;
mod error;
mod link;
pub mod models;
mod rewriter;
pub mod rules;

pub use client::{forwardable_headers, FeedClient, FetchPolicy, CLIENT_USER_AGENT};
pub use error::{FetchError, RewriteError, UrlError};
pub use link::{build_proxy_url, normalize_url, UrlGuard, AUTH_PARAM, URL_PARAM};
pub use models::{FetchedFeed, ProxyContext, TargetKind};
pub use rewriter::rewrite_feed;

pub type Result<T> = std::result::Result<T, FetchError>;
