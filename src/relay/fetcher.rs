//! Source fetcher module for retrieving relay lists from remote sources
//!
//! Sources are tried in order and the first one yielding at least one
//! parseable endpoint wins (strict fallback, not aggregation). An HTTP error
//! and an empty body are treated the same way: move on to the next source.

use crate::relay::models::Endpoint;
use crate::relay::parser::EndpointParser;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout for source requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default user agent for source requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Regex pattern to match IP:PORT patterns in text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})\b")
        .expect("Invalid IP:PORT regex")
});

/// Result of fetching from the source list
///
/// Fetching never fails outright: when every source is exhausted the
/// endpoint set is empty and `status` carries the per-source errors.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Deduplicated endpoints in first-seen order
    pub endpoints: Vec<Endpoint>,
    /// Human-readable status describing which source won, or what failed
    pub status: String,
}

impl FetchOutcome {
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Configuration for the source fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Timeout for each source request
    pub timeout: Duration,
    /// User agent for source requests
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Source fetcher for retrieving relay lists with ordered fallback
pub struct SourceFetcher {
    client: Client,
}

impl SourceFetcher {
    /// Create a new source fetcher with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(FetcherConfig::default())
    }

    /// Create a new source fetcher with custom configuration
    pub fn with_config(config: FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Fetch endpoints from the first source that yields a non-empty set
    ///
    /// Sources are tried strictly in order; per-source failures are recorded
    /// into the status string and never abort the overall fetch.
    pub async fn fetch(&self, sources: &[String]) -> FetchOutcome {
        let mut errors = Vec::new();

        for url in sources {
            let body = match self.fetch_source(url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(source = %url, error = %e, "source fetch failed");
                    errors.push(format!("{}: {}", url, e));
                    continue;
                }
            };

            let endpoints = Self::collect_endpoints(&body);
            if endpoints.is_empty() {
                debug!(source = %url, "source yielded no parseable endpoints");
                errors.push(format!("{}: no parseable endpoints", url));
                continue;
            }

            return FetchOutcome {
                status: format!("fetched {} endpoints from {}", endpoints.len(), url),
                endpoints,
            };
        }

        FetchOutcome {
            endpoints: Vec::new(),
            status: if errors.is_empty() {
                "no sources configured".to_string()
            } else {
                format!("all sources failed: {}", errors.join("; "))
            },
        }
    }

    /// Retrieve one source body, failing on transport errors and bad statuses
    async fn fetch_source(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Parse a source body into deduplicated endpoints, first-seen order
    ///
    /// Tries line-by-line parsing first; when that yields nothing (HTML-ish
    /// sources), falls back to regex IP:PORT extraction.
    pub fn collect_endpoints(body: &str) -> Vec<Endpoint> {
        let mut parsed = EndpointParser::parse_string(body);
        if parsed.is_empty() {
            parsed = Self::extract_with_regex(body);
        }

        let mut seen = HashSet::new();
        parsed
            .into_iter()
            .filter(|endpoint| seen.insert(endpoint.identity()))
            .collect()
    }

    /// Extract endpoints from free-form text using regex pattern matching
    fn extract_with_regex(content: &str) -> Vec<Endpoint> {
        IP_PORT_REGEX
            .captures_iter(content)
            .filter_map(|cap| {
                let host = cap.get(1)?.as_str();
                let port: u16 = cap.get(2)?.as_str().parse().ok()?;

                for part in host.split('.') {
                    let num: u32 = part.parse().ok()?;
                    if num > 255 {
                        return None;
                    }
                }

                if port == 0 {
                    return None;
                }

                Some(Endpoint::new(host.to_string(), port))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local listener
    async fn spawn_http_source(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{}/list.txt", addr)
    }

    #[test]
    fn test_collect_endpoints_dedup_first_seen() {
        let body = "1.2.3.4:1080\n5.6.7.8:1080\n1.2.3.4:1080\n9.9.9.9:1\n";
        let endpoints = SourceFetcher::collect_endpoints(body);
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0].identity(), "1.2.3.4:1080");
        assert_eq!(endpoints[1].identity(), "5.6.7.8:1080");
        assert_eq!(endpoints[2].identity(), "9.9.9.9:1");
    }

    #[test]
    fn test_collect_endpoints_regex_fallback() {
        let body = "<tr><td>10.0.0.1</td></tr> embedded 10.0.0.1:3128 here";
        let endpoints = SourceFetcher::collect_endpoints(body);
        assert!(endpoints.iter().any(|e| e.identity() == "10.0.0.1:3128"));
    }

    #[test]
    fn test_collect_endpoints_regex_rejects_bad_octets() {
        let body = "<p>999.999.999.999:8080</p>";
        let endpoints = SourceFetcher::collect_endpoints(body);
        assert!(endpoints.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_first_source_wins() {
        let url1 = spawn_http_source("HTTP/1.1 200 OK", "1.2.3.4:1080\n5.6.7.8:1081\n").await;
        let url2 = spawn_http_source("HTTP/1.1 200 OK", "9.9.9.9:9999\n").await;

        let fetcher = SourceFetcher::new().unwrap();
        let outcome = fetcher.fetch(&[url1.clone(), url2]).await;

        assert_eq!(outcome.endpoints.len(), 2);
        assert!(outcome.status.contains(&url1));
    }

    #[tokio::test]
    async fn test_fetch_falls_back_on_http_error() {
        let url1 = spawn_http_source("HTTP/1.1 500 Internal Server Error", "").await;
        let url2 = spawn_http_source(
            "HTTP/1.1 200 OK",
            "1.2.3.4:1080\n5.6.7.8:1081\n9.9.9.9:1082\n",
        )
        .await;

        let fetcher = SourceFetcher::new().unwrap();
        let outcome = fetcher.fetch(&[url1, url2.clone()]).await;

        assert_eq!(outcome.endpoints.len(), 3);
        assert!(outcome.status.contains(&url2));
    }

    #[tokio::test]
    async fn test_fetch_falls_back_on_empty_body() {
        let url1 = spawn_http_source("HTTP/1.1 200 OK", "# nothing usable\n").await;
        let url2 = spawn_http_source("HTTP/1.1 200 OK", "1.2.3.4:1080\n").await;

        let fetcher = SourceFetcher::new().unwrap();
        let outcome = fetcher.fetch(&[url1, url2]).await;

        assert_eq!(outcome.endpoints.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_all_sources_fail() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = SourceFetcher::with_config(
            FetcherConfig::new().with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        let url = format!("http://{}/list.txt", addr);
        let outcome = fetcher.fetch(&[url.clone()]).await;

        assert!(outcome.is_empty());
        assert!(!outcome.status.is_empty());
        assert!(outcome.status.contains(&url));
    }

    #[tokio::test]
    async fn test_fetch_no_sources() {
        let fetcher = SourceFetcher::new().unwrap();
        let outcome = fetcher.fetch(&[]).await;
        assert!(outcome.is_empty());
        assert!(!outcome.status.is_empty());
    }
}
