//! Ranker module for ordering working relays and summarizing a run

use crate::relay::models::{ProbeResult, RankedRelay, RunSummary};

/// Ranker for filtering, sorting, and aggregating probe results
pub struct Ranker;

impl Ranker {
    /// Rank working relays ascending by latency
    ///
    /// Failures are partitioned out explicitly before sorting; the sort is
    /// stable, so equal-latency relays keep their pre-sort relative order.
    pub fn rank(results: &[ProbeResult]) -> Vec<RankedRelay> {
        let mut working: Vec<(f64, &ProbeResult)> = results
            .iter()
            .filter(|r| r.is_working())
            .filter_map(|r| r.latency_ms.map(|latency| (latency, r)))
            .collect();

        working.sort_by(|a, b| a.0.total_cmp(&b.0));

        working
            .into_iter()
            .enumerate()
            .map(|(i, (latency, result))| RankedRelay {
                rank: i + 1,
                country_code: result.country_code.clone(),
                flag: result.flag.clone(),
                host: result.endpoint.host.clone(),
                port: result.endpoint.port,
                latency_ms: latency,
            })
            .collect()
    }

    /// Compute summary statistics over a full result collection
    pub fn summarize(results: &[ProbeResult], status_message: String) -> RunSummary {
        let tested = results.len();
        let successful = results.iter().filter(|r| r.is_working()).count();
        let success_rate = if tested == 0 {
            0.0
        } else {
            successful as f64 / tested as f64
        };

        let latencies: Vec<f64> = results
            .iter()
            .filter(|r| r.is_working())
            .filter_map(|r| r.latency_ms)
            .collect();
        let avg_latency_ms = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };

        RunSummary {
            tested,
            successful,
            success_rate,
            avg_latency_ms,
            status_message,
        }
    }
}
