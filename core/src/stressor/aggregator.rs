//! Result aggregation from multiple workers

use serde::Serialize;
use std::time::Duration;

use crate::worker::ThroughputStats;

/// Aggregated statistics from all workers
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Number of workers whose stats were collected
    pub num_threads: usize,

    /// Field-wise sum of every worker's stats
    pub stats: ThroughputStats,

    /// Wall time between start and finish
    pub duration: Duration,

    /// Overall operations per second
    pub ops_per_sec: f64,

    /// Fraction of reads that did not miss (0.0 - 1.0)
    pub hit_ratio: f64,
}

impl RunSummary {
    /// Derive rates from aggregated stats and the run duration
    pub fn new(num_threads: usize, stats: ThroughputStats, duration: Duration) -> Self {
        let secs = duration.as_secs_f64();
        let ops_per_sec = if secs > 0.0 {
            stats.ops as f64 / secs
        } else {
            0.0
        };

        Self {
            num_threads,
            stats,
            duration,
            ops_per_sec,
            hit_ratio: stats.hit_ratio(),
        }
    }
}

/// Aggregate statistics from multiple workers
///
/// Order does not matter: the merge is a field-wise sum.
pub fn aggregate_throughput_stats(stats: &[ThroughputStats]) -> ThroughputStats {
    stats.iter().sum()
}
