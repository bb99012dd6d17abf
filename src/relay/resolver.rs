//! Location resolver module for endpoint geolocation with a memoized cache

use crate::relay::models::{UNKNOWN_COUNTRY, UNKNOWN_FLAG};
use crate::Result;
use anyhow::anyhow;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for geolocation lookups in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default lookup URL template; `{host}` is replaced with the endpoint host
const DEFAULT_LOOKUP_URL: &str = "http://ip-api.com/json/{host}";

/// Response fields tried in order; observed providers disagree on naming
const COUNTRY_FIELDS: &[&str] = &["countryCode", "country_code", "country"];

/// Configuration for the location resolver
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Lookup URL template containing a `{host}` placeholder
    pub lookup_url: String,
    /// Timeout for each lookup request
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookup_url(mut self, url: String) -> Self {
        self.lookup_url = url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Location resolver mapping hosts to `(flag, country_code)` pairs
///
/// Lookups are memoized per host. Failed lookups cache the unknown pair
/// rather than retrying, bounding total lookup cost per run.
pub struct LocationResolver {
    config: ResolverConfig,
    client: Client,
    cache: Mutex<HashMap<String, (String, String)>>,
}

impl LocationResolver {
    /// Create a new resolver with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ResolverConfig::default())
    }

    /// Create a new resolver with custom configuration
    pub fn with_config(config: ResolverConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            config,
            client,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve a host to `(flag, country_code)`, consulting the cache first
    ///
    /// Never fails: any lookup error resolves to the unknown pair, which is
    /// cached like a real answer. Concurrent resolvers for the same host
    /// converge on whichever entry lands first.
    pub async fn resolve(&self, host: &str) -> (String, String) {
        if let Some(cached) = self.cache_get(host) {
            return cached;
        }

        let pair = match self.lookup_country(host).await {
            Ok(code) => {
                debug!(host = %host, country = %code, "resolved location");
                (country_flag(&code), code)
            }
            Err(e) => {
                warn!(host = %host, error = %e, "location lookup failed");
                (UNKNOWN_FLAG.to_string(), UNKNOWN_COUNTRY.to_string())
            }
        };

        self.cache_insert(host, pair)
    }

    fn cache_get(&self, host: &str) -> Option<(String, String)> {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(host).cloned()
    }

    /// Insert-if-absent; the first writer for a host wins
    fn cache_insert(&self, host: &str, pair: (String, String)) -> (String, String) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.entry(host.to_string()).or_insert(pair).clone()
    }

    /// Perform one external lookup, returning the ISO country code
    async fn lookup_country(&self, host: &str) -> Result<String> {
        let url = self.config.lookup_url.replace("{host}", host);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body: serde_json::Value = response.json().await?;

        for field in COUNTRY_FIELDS {
            if let Some(code) = body.get(field).and_then(|v| v.as_str()) {
                if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
                    return Ok(code.to_ascii_uppercase());
                }
            }
        }

        Err(anyhow!("no country code in lookup response"))
    }
}

/// Map a 2-letter country code to its Unicode regional-indicator flag
///
/// Anything that is not exactly two ASCII letters maps to the white flag.
pub fn country_flag(code: &str) -> String {
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return UNKNOWN_FLAG.to_string();
    }
    code.chars()
        .filter_map(|c| char::from_u32(0x1F1E6 + (c.to_ascii_uppercase() as u32 - 'A' as u32)))
        .collect()
}
