use std::sync::Arc;

use feed::{FeedClient, FetchPolicy, UrlGuard};

use crate::config::Config;
use crate::services::{AccessGate, FeedCache, HttpClients, MediaRelay};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: Arc<AccessGate>,
    pub fetcher: Arc<FeedClient>,
    pub cache: Arc<FeedCache>,
    pub relay: Arc<MediaRelay>,
}

impl AppState {
    /// Wire up all services. Starts the cache sweeper, so a Tokio runtime must be running.
    pub fn new(config: Config, clients: HttpClients) -> Self {
        let guard = UrlGuard::new(config.allowed_hosts.clone());

        let gate = AccessGate::new(config.api_key.clone(), config.basic_auth.clone());

        let fetcher = FeedClient::new(
            clients.feed,
            FetchPolicy {
                max_attempts: config.max_retries,
                backoff_unit: config.retry_backoff,
            },
            guard.clone(),
        );

        let cache = FeedCache::new(config.cache_sweep_interval);

        let relay = MediaRelay::new(clients.media, guard);

        Self {
            config: Arc::new(config),
            gate: Arc::new(gate),
            fetcher: Arc::new(fetcher),
            cache: Arc::new(cache),
            relay: Arc::new(relay),
        }
    }
}
