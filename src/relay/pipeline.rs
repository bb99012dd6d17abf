//! End-to-end pipeline: fetch, dedup, probe, resolve, rank
//!
//! This is the surface consumed by presentation layers: they hand over
//! source URLs and a concurrency limit, and get back a ranked result set
//! plus a run summary. Once a non-empty endpoint set exists there is no
//! fatal error path; "nothing available" and "nothing reachable" are
//! status data.

use crate::relay::fetcher::{FetcherConfig, SourceFetcher};
use crate::relay::models::{ProbeResult, RankedRelay, RunSummary};
use crate::relay::prober::{ProbeMode, ProberConfig, RelayProber};
use crate::relay::ranker::Ranker;
use crate::relay::resolver::{LocationResolver, ResolverConfig};
use crate::relay::scheduler::{ProbeScheduler, ProgressFn, SchedulerConfig};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default cap on the number of endpoints tested per run
const DEFAULT_MAX_ENDPOINTS: usize = 30;

/// Default number of concurrent probes
const DEFAULT_CONCURRENCY: usize = 10;

/// Default timeout for each probe in seconds
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Default timeout for each source fetch in seconds
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Source URLs tried in order until one yields endpoints
    pub sources: Vec<String>,
    /// Cap on how many endpoints are tested per run
    pub max_endpoints: usize,
    /// Maximum number of probes in flight at once
    pub concurrency: usize,
    /// Timeout for each probe
    pub probe_timeout: Duration,
    /// Timeout for each source fetch
    pub fetch_timeout: Duration,
    /// Probe verification level
    pub mode: ProbeMode,
    /// Geolocation lookup URL template with a `{host}` placeholder
    pub lookup_url: String,
    /// Whether to geolocate working relays
    pub resolve_locations: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            max_endpoints: DEFAULT_MAX_ENDPOINTS,
            concurrency: DEFAULT_CONCURRENCY,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            mode: ProbeMode::default(),
            lookup_url: ResolverConfig::default().lookup_url,
            resolve_locations: true,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_max_endpoints(mut self, max_endpoints: usize) -> Self {
        self.max_endpoints = max_endpoints;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_mode(mut self, mode: ProbeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_lookup_url(mut self, url: String) -> Self {
        self.lookup_url = url;
        self
    }

    pub fn with_resolve_locations(mut self, resolve: bool) -> Self {
        self.resolve_locations = resolve;
        self
    }
}

/// Full result of a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Working relays, ranked ascending by latency
    pub relays: Vec<RankedRelay>,
    /// Summary statistics and status message
    pub summary: RunSummary,
    /// Every probe result, including failures, in completion order
    pub results: Vec<ProbeResult>,
}

/// The end-to-end relay discovery and ranking pipeline
pub struct Pipeline {
    config: PipelineConfig,
    fetcher: SourceFetcher,
    resolver: Option<Arc<LocationResolver>>,
    on_progress: Option<Arc<ProgressFn>>,
}

impl Pipeline {
    /// Create a pipeline over the given sources with default limits
    pub fn new(sources: Vec<String>) -> Result<Self> {
        Self::with_config(PipelineConfig::new().with_sources(sources))
    }

    /// Create a pipeline with custom configuration
    pub fn with_config(config: PipelineConfig) -> Result<Self> {
        let fetcher = SourceFetcher::with_config(
            FetcherConfig::new().with_timeout(config.fetch_timeout),
        )?;

        let resolver = if config.resolve_locations {
            Some(Arc::new(LocationResolver::with_config(
                ResolverConfig::new().with_lookup_url(config.lookup_url.clone()),
            )?))
        } else {
            None
        };

        Ok(Self {
            config,
            fetcher,
            resolver,
            on_progress: None,
        })
    }

    /// Register a progress sink invoked as `(completed, total, successes)`
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize, usize) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Run the full pipeline: fetch, probe, resolve, rank
    pub async fn run(&self) -> PipelineReport {
        let outcome = self.fetcher.fetch(&self.config.sources).await;
        if outcome.is_empty() {
            let status = format!("no endpoints available: {}", outcome.status);
            return PipelineReport {
                relays: Vec::new(),
                summary: Ranker::summarize(&[], status),
                results: Vec::new(),
            };
        }

        let mut endpoints = outcome.endpoints;
        if endpoints.len() > self.config.max_endpoints {
            endpoints.truncate(self.config.max_endpoints);
        }
        info!(count = endpoints.len(), "probing endpoint set");

        let prober = RelayProber::with_config(
            ProberConfig::new()
                .with_timeout(self.config.probe_timeout)
                .with_mode(self.config.mode),
        );
        let mut scheduler = ProbeScheduler::with_config(
            SchedulerConfig::new().with_concurrency(self.config.concurrency),
            prober,
        );
        if let Some(resolver) = &self.resolver {
            scheduler = scheduler.with_resolver(Arc::clone(resolver));
        }
        if let Some(callback) = &self.on_progress {
            let callback = Arc::clone(callback);
            scheduler = scheduler
                .with_progress(move |completed, total, successes| {
                    callback(completed, total, successes)
                });
        }

        let results = scheduler.run(endpoints).await;
        let relays = Ranker::rank(&results);

        let successful = results.iter().filter(|r| r.is_working()).count();
        let status = if successful == 0 {
            format!("{}; no endpoints reachable", outcome.status)
        } else {
            format!(
                "{}; {}/{} relays responded",
                outcome.status,
                successful,
                results.len()
            )
        };

        PipelineReport {
            relays,
            summary: Ranker::summarize(&results, status),
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::models::Endpoint;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `body` as a relay list to every request
    async fn spawn_source(body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let body = body.clone();
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{}/relays.txt", addr)
    }

    /// A relay that completes the no-auth handshake
    async fn spawn_relay() -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut greeting = [0u8; 3];
                if stream.read_exact(&mut greeting).await.is_ok() {
                    let _ = stream.write_all(&[0x05, 0x00]).await;
                }
            }
        });
        Endpoint::new("127.0.0.1".to_string(), addr.port())
    }

    async fn closed_endpoint() -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Endpoint::new("127.0.0.1".to_string(), addr.port())
    }

    fn test_config(sources: Vec<String>) -> PipelineConfig {
        PipelineConfig::new()
            .with_sources(sources)
            .with_probe_timeout(Duration::from_secs(2))
            .with_resolve_locations(false)
    }

    #[tokio::test]
    async fn test_pipeline_end_to_end() {
        let relay = spawn_relay().await;
        let dead1 = closed_endpoint().await;
        let dead2 = closed_endpoint().await;
        let body = format!("{}\n{}\n{}\n", dead1, relay, dead2);
        let url = spawn_source(body).await;

        let pipeline = Pipeline::with_config(test_config(vec![url.clone()])).unwrap();
        let report = pipeline.run().await;

        assert_eq!(report.summary.tested, 3);
        assert_eq!(report.summary.successful, 1);
        assert_eq!(report.relays.len(), 1);
        assert_eq!(report.relays[0].rank, 1);
        assert_eq!(report.relays[0].host, relay.host);
        assert_eq!(report.relays[0].port, relay.port);
        assert!(report.summary.avg_latency_ms.is_some());
        assert!(report.summary.status_message.contains(&url));
    }

    #[tokio::test]
    async fn test_pipeline_caps_endpoint_count() {
        let mut lines = String::new();
        for endpoint in [
            closed_endpoint().await,
            closed_endpoint().await,
            closed_endpoint().await,
            closed_endpoint().await,
        ] {
            lines.push_str(&format!("{}\n", endpoint));
        }
        let url = spawn_source(lines).await;

        let config = test_config(vec![url]).with_max_endpoints(2);
        let pipeline = Pipeline::with_config(config).unwrap();
        let report = pipeline.run().await;

        assert_eq!(report.summary.tested, 2);
    }

    #[tokio::test]
    async fn test_pipeline_no_sources_available() {
        let dead = closed_endpoint().await;
        let url = format!("http://{}/relays.txt", dead);

        let config = test_config(vec![url]).with_fetch_timeout(Duration::from_secs(2));
        let pipeline = Pipeline::with_config(config).unwrap();
        let report = pipeline.run().await;

        assert!(report.relays.is_empty());
        assert_eq!(report.summary.tested, 0);
        assert_eq!(report.summary.avg_latency_ms, None);
        assert!(report.summary.status_message.contains("no endpoints available"));
    }

    #[tokio::test]
    async fn test_pipeline_nothing_reachable() {
        let dead = closed_endpoint().await;
        let url = spawn_source(format!("{}\n", dead)).await;

        let pipeline = Pipeline::with_config(test_config(vec![url])).unwrap();
        let report = pipeline.run().await;

        assert_eq!(report.summary.tested, 1);
        assert_eq!(report.summary.successful, 0);
        assert!(report.relays.is_empty());
        assert!(report.summary.status_message.contains("no endpoints reachable"));
    }

    #[tokio::test]
    async fn test_pipeline_reports_progress() {
        let dead1 = closed_endpoint().await;
        let dead2 = closed_endpoint().await;
        let url = spawn_source(format!("{}\n{}\n", dead1, dead2)).await;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let pipeline = Pipeline::with_config(test_config(vec![url]))
            .unwrap()
            .with_progress(move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let report = pipeline.run().await;

        assert_eq!(report.summary.tested, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
