mod sweeper;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use feed::normalize_url;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use url::Url;

pub use sweeper::CacheSweeperHandle;

/// Longest lifetime an entry can get, whatever TTL is asked for
const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Identity of a rewritten feed.
///
/// The proxy base is part of the key because rewritten links embed it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_feed(source: &Url, proxy_base: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(proxy_base.as_bytes());
        hasher.update(b"\n");
        hasher.update(normalize_url(source).as_str().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct CacheEntry {
    payload: Bytes,
    expires_at: Instant,
}

type Entries = RwLock<HashMap<CacheKey, CacheEntry>>;

/// In-memory TTL cache of rewritten feeds.
///
/// Entries are visible while `now < expires_at`. Expired entries are dropped
/// by a background sweeper even if nobody reads them again.
pub struct FeedCache {
    entries: Arc<Entries>,
    sweeper: CacheSweeperHandle,
}

impl FeedCache {
    /// Create the cache and start its sweeper. Must be called inside a Tokio runtime.
    pub fn new(sweep_interval: Duration) -> Self {
        let entries = Arc::new(Entries::default());
        let sweeper = sweeper::create_cache_sweeper(Arc::clone(&entries), sweep_interval);
        Self { entries, sweeper }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.payload.clone())
    }

    /// Insert or replace an entry
    pub fn set(&self, key: CacheKey, payload: Bytes, ttl: Duration) {
        let entry = CacheEntry {
            payload,
            expires_at: Instant::now() + ttl.min(MAX_TTL),
        };
        self.entries.write().insert(key, entry);
    }

    /// Remove expired entries now, returning how many were dropped
    pub fn sweep(&self) -> usize {
        sweep_expired(&self.entries)
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop the background sweeper
    pub async fn shutdown(&self) {
        self.sweeper.shutdown().await;
    }
}

fn sweep_expired(entries: &Entries) -> usize {
    let now = Instant::now();
    let mut entries = entries.write();
    let before = entries.len();
    entries.retain(|_, entry| entry.expires_at > now);
    before - entries.len()
}
