//! Endpoint parser module for parsing relay list lines

use crate::relay::models::Endpoint;

/// Endpoint parser for turning raw source-list lines into endpoints
///
/// Pure and side-effect-free; all I/O stays in the fetcher.
pub struct EndpointParser;

impl EndpointParser {
    /// Parse a single raw line into an endpoint
    ///
    /// Supported shapes:
    /// - `HOST:PORT`
    /// - `HOST:PORT@USER:PASS` (credentials are discarded)
    /// - `HOST:PORT  # trailing annotation` (annotation is discarded)
    ///
    /// Empty lines and `#` comments yield `None`, as does anything that is
    /// not exactly one `:` between a non-empty host and a port in 1-65535.
    pub fn parse_line(line: &str) -> Option<Endpoint> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        // Only the first whitespace-delimited token counts
        let token = line.split_whitespace().next()?;

        // Strip trailing credentials (HOST:PORT@USER:PASS)
        let token = token.split('@').next()?;

        let mut parts = token.split(':');
        let host = parts.next()?.trim();
        let port_str = parts.next()?.trim();
        if parts.next().is_some() {
            return None;
        }
        if host.is_empty() {
            return None;
        }

        let port: u16 = port_str.parse().ok()?;
        if port == 0 {
            return None;
        }

        Some(Endpoint::new(host.to_string(), port))
    }

    /// Parse endpoints from a string (multiple lines), skipping bad lines
    pub fn parse_string(content: &str) -> Vec<Endpoint> {
        content.lines().filter_map(Self::parse_line).collect()
    }
}
