//! Probe scheduler module for fanning probes out under a concurrency cap

use crate::relay::models::{Endpoint, ErrorClass, ProbeResult};
use crate::relay::prober::RelayProber;
use crate::relay::resolver::LocationResolver;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::debug;

/// Default number of concurrent probes
const DEFAULT_CONCURRENCY: usize = 10;

/// Progress sink invoked as `(completed, total, successes)`
pub type ProgressFn = dyn Fn(usize, usize, usize) + Send + Sync;

/// Configuration for the probe scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of probes in flight at once
    pub concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Probe scheduler running a prober over a set of endpoints
///
/// Every submitted endpoint yields exactly one result; results are collected
/// in completion order, which is not the submission order. A failing probe
/// never cancels its siblings.
pub struct ProbeScheduler {
    config: SchedulerConfig,
    prober: RelayProber,
    resolver: Option<Arc<LocationResolver>>,
    on_progress: Option<Arc<ProgressFn>>,
}

impl ProbeScheduler {
    /// Create a scheduler with default configuration
    pub fn new(prober: RelayProber) -> Self {
        Self::with_config(SchedulerConfig::default(), prober)
    }

    /// Create a scheduler with custom configuration
    pub fn with_config(config: SchedulerConfig, prober: RelayProber) -> Self {
        Self {
            config,
            prober,
            resolver: None,
            on_progress: None,
        }
    }

    /// Enrich successful probes with geolocation from this resolver
    pub fn with_resolver(mut self, resolver: Arc<LocationResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Register a progress sink invoked once per completed probe
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize, usize) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Probe all endpoints, collecting one result per endpoint
    pub async fn run(&self, endpoints: Vec<Endpoint>) -> Vec<ProbeResult> {
        let total = endpoints.len();
        debug!(total, concurrency = self.config.concurrency, "starting probe batch");

        let mut in_flight = stream::iter(endpoints)
            .map(|endpoint| {
                let prober = self.prober.clone();
                let resolver = self.resolver.clone();
                async move {
                    let fallback = endpoint.clone();
                    // A panicking probe degrades to a failed result instead
                    // of taking the whole batch down
                    let mut result = AssertUnwindSafe(prober.probe(&endpoint))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            ProbeResult::failed(fallback, ErrorClass::Other)
                        });

                    if result.is_working() {
                        if let Some(resolver) = resolver {
                            let (flag, code) = resolver.resolve(&result.endpoint.host).await;
                            result = result.with_location(flag, code);
                        }
                    }
                    result
                }
            })
            .buffer_unordered(self.config.concurrency.max(1));

        let mut results = Vec::with_capacity(total);
        let mut successes = 0;
        while let Some(result) = in_flight.next().await {
            if result.is_working() {
                successes += 1;
            }
            if let Some(callback) = &self.on_progress {
                callback(results.len() + 1, total, successes);
            }
            results.push(result);
        }

        debug!(total, successes, "probe batch complete");
        results
    }
}
