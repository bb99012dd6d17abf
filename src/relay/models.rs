//! Relay data models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Country code used when geolocation is unknown or disabled
pub const UNKNOWN_COUNTRY: &str = "??";

/// Flag glyph used when geolocation is unknown or disabled
pub const UNKNOWN_FLAG: &str = "\u{1F3F3}\u{FE0F}";

/// A candidate relay endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    /// Identity string in HOST:PORT form, used as the deduplication key
    pub fn identity(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Classification of a failed probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    Timeout,
    Refused,
    Reset,
    MalformedResponse,
    Other,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Timeout => write!(f, "timeout"),
            ErrorClass::Refused => write!(f, "refused"),
            ErrorClass::Reset => write!(f, "reset"),
            ErrorClass::MalformedResponse => write!(f, "malformed-response"),
            ErrorClass::Other => write!(f, "other"),
        }
    }
}

/// Outcome of probing a single endpoint
///
/// Produced exactly once per endpoint per run. `latency_ms` is `Some` only
/// when the probe succeeded; failures carry the error class instead of a
/// sentinel latency so downstream code never depends on a magic value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub endpoint: Endpoint,
    pub reachable: bool,
    pub protocol_ok: bool,
    pub latency_ms: Option<f64>,
    pub error: Option<ErrorClass>,
    pub country_code: String,
    pub flag: String,
}

impl ProbeResult {
    pub fn success(endpoint: Endpoint, latency_ms: f64) -> Self {
        Self {
            endpoint,
            reachable: true,
            protocol_ok: true,
            latency_ms: Some(latency_ms),
            error: None,
            country_code: UNKNOWN_COUNTRY.to_string(),
            flag: UNKNOWN_FLAG.to_string(),
        }
    }

    pub fn failed(endpoint: Endpoint, error: ErrorClass) -> Self {
        Self {
            endpoint,
            reachable: false,
            protocol_ok: false,
            latency_ms: None,
            error: Some(error),
            country_code: UNKNOWN_COUNTRY.to_string(),
            flag: UNKNOWN_FLAG.to_string(),
        }
    }

    /// A reachable endpoint that did not complete the protocol handshake
    pub fn reachable_only(endpoint: Endpoint, error: ErrorClass) -> Self {
        Self {
            endpoint,
            reachable: true,
            protocol_ok: false,
            latency_ms: None,
            error: Some(error),
            country_code: UNKNOWN_COUNTRY.to_string(),
            flag: UNKNOWN_FLAG.to_string(),
        }
    }

    pub fn with_location(mut self, flag: String, country_code: String) -> Self {
        self.flag = flag;
        self.country_code = country_code;
        self
    }

    pub fn is_working(&self) -> bool {
        self.reachable && self.protocol_ok
    }
}

/// A working relay in the final ranked output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedRelay {
    pub rank: usize,
    pub country_code: String,
    pub flag: String,
    pub host: String,
    pub port: u16,
    pub latency_ms: f64,
}

/// Summary statistics for a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub tested: usize,
    pub successful: usize,
    pub success_rate: f64,
    /// Average latency over successful probes, absent when none succeeded
    pub avg_latency_ms: Option<f64>,
    pub status_message: String,
}
