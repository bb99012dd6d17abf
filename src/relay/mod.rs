//! Relay module for discovering, probing, and ranking relay endpoints
//!
//! This module provides functionality for:
//! - Fetching relay lists from remote sources with ordered fallback
//! - Parsing raw list lines into normalized endpoints
//! - Probing endpoints for reachability and protocol support
//! - Resolving endpoint geolocation with a memoized cache
//! - Ranking working relays by latency

pub mod fetcher;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod prober;
pub mod ranker;
pub mod resolver;
pub mod scheduler;

pub use fetcher::{FetchOutcome, FetcherConfig, SourceFetcher};
pub use models::{Endpoint, ErrorClass, ProbeResult, RankedRelay, RunSummary};
pub use parser::EndpointParser;
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport};
pub use prober::{ProbeMode, ProberConfig, RelayProber};
pub use ranker::Ranker;
pub use resolver::{country_flag, LocationResolver, ResolverConfig};
pub use scheduler::{ProbeScheduler, ProgressFn, SchedulerConfig};
