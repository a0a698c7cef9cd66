use std::fmt;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CACHE_TTL_SECS: u64 = 600;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

// Upper bounds keep deadline arithmetic far from `Instant` overflow
const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const MAX_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;
const MAX_RETRY_BACKOFF_MS: u64 = 60 * 1000;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API_KEY must be set")]
    MissingApiKey,
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Username/password pair accepted as an alternative to the API key
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct Config {
    /// Release version reported by `/health`
    pub version: String,
    pub port: u16,
    pub api_key: String,
    pub basic_auth: Option<BasicCredentials>,
    pub cache_ttl: Duration,
    pub cache_sweep_interval: Duration,
    /// Total upstream attempts per feed request
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub request_timeout: Duration,
    /// Hosts (and their subdomains) feeds and media may be fetched from.
    /// Empty means any public host.
    pub allowed_hosts: Vec<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("version", &self.version)
            .field("port", &self.port)
            .field("api_key", &"<redacted>")
            .field("basic_auth", &self.basic_auth)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_sweep_interval", &self.cache_sweep_interval)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("request_timeout", &self.request_timeout)
            .field("allowed_hosts", &self.allowed_hosts)
            .finish()
    }
}

impl Config {
    /// Config with defaults for everything except the API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            port: DEFAULT_PORT,
            api_key: api_key.into(),
            basic_auth: None,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            allowed_hosts: Vec::new(),
        }
    }

    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("API_KEY").ok_or(ConfigError::MissingApiKey)?;
        let mut config = Self::new(api_key);

        // USERNAME is often set by the login shell, so a lone half only disables basic auth
        config.basic_auth = match (get("USERNAME"), get("PASSWORD")) {
            (Some(username), Some(password)) => Some(BasicCredentials { username, password }),
            (None, None) => None,
            _ => {
                tracing::warn!("Only one of USERNAME and PASSWORD is set, basic auth disabled");
                None
            }
        };

        if let Some(port) = get("PORT") {
            config.port = parse("PORT", &port)?;
        }
        if let Some(secs) = get("CACHE_TTL_SECS") {
            config.cache_ttl =
                Duration::from_secs(parse_bounded("CACHE_TTL_SECS", &secs, MAX_CACHE_TTL_SECS)?);
        }
        if let Some(secs) = get("CACHE_SWEEP_INTERVAL_SECS") {
            config.cache_sweep_interval =
                Duration::from_secs(parse_bounded(
                    "CACHE_SWEEP_INTERVAL_SECS",
                    &secs,
                    MAX_SWEEP_INTERVAL_SECS,
                )?);
        }
        if let Some(retries) = get("MAX_RETRIES") {
            config.max_retries = parse::<u32>("MAX_RETRIES", &retries)?.max(1);
        }
        if let Some(ms) = get("RETRY_BACKOFF_MS") {
            let ms: u64 = parse("RETRY_BACKOFF_MS", &ms)?;
            if ms > MAX_RETRY_BACKOFF_MS {
                return Err(too_large("RETRY_BACKOFF_MS", ms, MAX_RETRY_BACKOFF_MS));
            }
            config.retry_backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = get("REQUEST_TIMEOUT_SECS") {
            config.request_timeout =
                Duration::from_secs(parse_bounded(
                    "REQUEST_TIMEOUT_SECS",
                    &secs,
                    MAX_REQUEST_TIMEOUT_SECS,
                )?);
        }
        if let Some(hosts) = get("ALLOWED_HOSTS") {
            config.allowed_hosts = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a value in `1..=max`
fn parse_bounded(key: &'static str, value: &str, max: u64) -> Result<u64, ConfigError> {
    match parse::<u64>(key, value)? {
        0 => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        n if n > max => Err(too_large(key, n, max)),
        n => Ok(n),
    }
}

fn too_large(key: &'static str, value: u64, max: u64) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: format!("must be at most {}", max),
    }
}
