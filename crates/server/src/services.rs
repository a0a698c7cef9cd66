mod auth;
mod cache;
mod http_client;
mod relay;

pub use auth::{secure_compare, AccessGate, AuthError, Credentials};
pub use cache::{CacheKey, CacheSweeperHandle, FeedCache};
pub use http_client::{HttpClientError, HttpClients};
pub use relay::{MediaRelay, RelayError};
