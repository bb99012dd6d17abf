//! Relay Scout - Relay Discovery and Health Checker
//!
//! This crate discovers candidate relay endpoints from remote source lists,
//! verifies each one is reachable and speaks the expected relay protocol,
//! measures latency, enriches working relays with geolocation metadata, and
//! produces a ranked, deduplicated result set.
//!
//! The crate is a library: the surrounding presentation layer owns the CLI/UI
//! and calls [`Pipeline::run`] with a list of source URLs and a concurrency
//! budget, receiving back a [`PipelineReport`].

pub mod relay;

pub use relay::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
