//! Relay prober module for reachability and protocol handshake checks

use crate::relay::models::{Endpoint, ErrorClass, ProbeResult};
use std::io;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Default timeout for each probe in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Greeting sent to the relay: protocol version 5, one auth method, no-auth
const GREETING: [u8; 3] = [0x05, 0x01, 0x00];

/// Expected protocol version in the relay's reply
const PROTOCOL_VERSION: u8 = 0x05;

/// Expected "no authentication required" method code in the reply
const NO_AUTH: u8 = 0x00;

/// Verification level for a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMode {
    /// Open a TCP connection only; protocol support is assumed
    Reachability,
    /// Connect, then exchange the no-auth greeting to confirm the protocol
    #[default]
    Handshake,
}

/// Configuration for the relay prober
#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// Timeout applied to the connect and to each handshake I/O step
    pub timeout: Duration,
    /// Verification level
    pub mode: ProbeMode,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            mode: ProbeMode::default(),
        }
    }
}

impl ProberConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_mode(mut self, mode: ProbeMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Relay prober for verifying a single endpoint
///
/// Transport errors never escape: every probe returns a [`ProbeResult`]
/// with the failure captured in its error class.
#[derive(Debug, Clone)]
pub struct RelayProber {
    config: ProberConfig,
}

impl RelayProber {
    /// Create a new prober with default configuration
    pub fn new() -> Self {
        Self {
            config: ProberConfig::default(),
        }
    }

    /// Create a new prober with custom configuration
    pub fn with_config(config: ProberConfig) -> Self {
        Self { config }
    }

    /// Probe one endpoint, measuring latency up to the point of
    /// success/failure determination
    pub async fn probe(&self, endpoint: &Endpoint) -> ProbeResult {
        let start = Instant::now();

        let stream = match tokio::time::timeout(
            self.config.timeout,
            TcpStream::connect((endpoint.host.as_str(), endpoint.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!(endpoint = %endpoint, error = %e, "connect failed");
                return ProbeResult::failed(endpoint.clone(), classify_io_error(&e));
            }
            Err(_) => {
                return ProbeResult::failed(endpoint.clone(), ErrorClass::Timeout);
            }
        };

        match self.config.mode {
            ProbeMode::Reachability => {
                ProbeResult::success(endpoint.clone(), elapsed_ms(start))
            }
            ProbeMode::Handshake => self.handshake(endpoint, stream, start).await,
        }
        // Stream is dropped here on every path, closing the connection
    }

    /// Exchange the greeting and verify the 2-byte reply
    async fn handshake(
        &self,
        endpoint: &Endpoint,
        mut stream: TcpStream,
        start: Instant,
    ) -> ProbeResult {
        if let Err(class) = self.handshake_io(&mut stream).await {
            debug!(endpoint = %endpoint, error = %class, "handshake failed");
            return ProbeResult::reachable_only(endpoint.clone(), class);
        }
        ProbeResult::success(endpoint.clone(), elapsed_ms(start))
    }

    async fn handshake_io(&self, stream: &mut TcpStream) -> std::result::Result<(), ErrorClass> {
        tokio::time::timeout(self.config.timeout, stream.write_all(&GREETING))
            .await
            .map_err(|_| ErrorClass::Timeout)?
            .map_err(|e| classify_io_error(&e))?;

        let mut reply = [0u8; 2];
        tokio::time::timeout(self.config.timeout, stream.read_exact(&mut reply))
            .await
            .map_err(|_| ErrorClass::Timeout)?
            .map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => ErrorClass::MalformedResponse,
                _ => classify_io_error(&e),
            })?;

        if reply[0] != PROTOCOL_VERSION || reply[1] != NO_AUTH {
            return Err(ErrorClass::MalformedResponse);
        }
        Ok(())
    }
}

impl Default for RelayProber {
    fn default() -> Self {
        Self::new()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn classify_io_error(e: &io::Error) -> ErrorClass {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => ErrorClass::Refused,
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => ErrorClass::Reset,
        io::ErrorKind::TimedOut => ErrorClass::Timeout,
        _ => ErrorClass::Other,
    }
}
