//! Cache engine statistics and run reports

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::stressor::RunSummary;

/// Counters kept by a cache engine, independent of the stressor's own view
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Items currently stored
    pub num_items: u64,

    /// Bytes of keys and values currently stored
    pub live_bytes: u64,

    /// Reads that found their key
    pub num_cache_gets: u64,

    /// Reads that did not find their key
    pub num_cache_get_miss: u64,

    /// Successful writes
    pub num_cache_sets: u64,

    /// Writes rejected for lack of capacity
    pub num_cache_set_failures: u64,

    /// Successful deletes
    pub num_cache_dels: u64,

    /// Items dropped because their TTL elapsed
    pub num_cache_expired: u64,

    /// Operations that failed inside the engine
    pub num_cache_errors: u64,
}

impl CacheStats {
    /// Total reads seen by the engine
    pub fn total_gets(&self) -> u64 {
        self.num_cache_gets + self.num_cache_get_miss
    }

    /// Fraction of reads that hit (0.0 - 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.total_gets();
        if total == 0 {
            0.0
        } else {
            self.num_cache_gets as f64 / total as f64
        }
    }
}

/// Complete result of one stressor run, as written to report files
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Cache engine name
    pub engine: String,

    /// Workload source name
    pub workload: String,

    /// Number of worker threads
    pub num_threads: usize,

    /// Wall-clock start of the run
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Wall-clock end of the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Stressor-side throughput
    pub summary: RunSummary,

    /// Engine-side counters
    pub cache: CacheStats,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        let t = &s.stats;
        writeln!(f, "== Test Results ({} / {}) ==", self.engine, self.workload)?;
        writeln!(f, "Threads       : {}", self.num_threads)?;
        writeln!(f, "Duration      : {:.2}s", s.duration.as_secs_f64())?;
        writeln!(f, "Total Ops     : {}", t.ops)?;
        writeln!(f, "Ops/sec       : {:.2}", s.ops_per_sec)?;
        writeln!(f, "Sets          : {}", t.set)?;
        writeln!(
            f,
            "Gets          : {} (miss {}, hit ratio {:.2}%)",
            t.get,
            t.get_miss,
            s.hit_ratio * 100.0
        )?;
        writeln!(f, "Deletes       : {}", t.del)?;
        writeln!(f, "Unsupported   : {}", t.unsupported())?;
        writeln!(f, "Errors        : {}", t.errors)?;
        writeln!(f, "Cache Items   : {}", self.cache.num_items)?;
        write!(f, "Cache Bytes   : {}", self.cache.live_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::ThroughputStats;
    use std::time::Duration;

    #[test]
    fn test_cache_stats_hit_ratio() {
        let stats = CacheStats {
            num_cache_gets: 75,
            num_cache_get_miss: 25,
            ..Default::default()
        };
        assert_eq!(stats.total_gets(), 100);
        assert!((stats.hit_ratio() - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_cache_stats_hit_ratio_no_reads() {
        assert_eq!(CacheStats::default().hit_ratio(), 0.0);
    }

    #[test]
    fn test_run_report_render_and_serialize() {
        let stats = ThroughputStats {
            ops: 10,
            set: 4,
            get: 6,
            get_miss: 3,
            ..Default::default()
        };
        let report = RunReport {
            engine: "memory".into(),
            workload: "synthetic".into(),
            num_threads: 2,
            started_at: chrono::Utc::now(),
            ended_at: None,
            summary: RunSummary::new(2, stats, Duration::from_secs(2)),
            cache: CacheStats::default(),
        };

        let text = report.to_string();
        assert!(text.contains("Total Ops     : 10"));
        assert!(text.contains("Ops/sec       : 5.00"));
        assert!(text.contains("hit ratio 50.00%"));

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"engine\":\"memory\""));
        assert!(json.contains("\"get_miss\":3"));
        assert!(!json.contains("ended_at"));
    }
}
