//! Worker throughput statistics

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Operation counters kept by a single worker thread
///
/// Each worker owns its value for the whole run and hands it back when its
/// thread is joined, so counters never need synchronization.
///
/// `ops` counts every executed iteration, including operation kinds the
/// stressor does not dispatch; those appear in no other counter (see
/// [`ThroughputStats::unsupported`]). A storage error counts toward the
/// operation's own counter and `errors`, never toward `get_miss`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThroughputStats {
    /// Executed operations
    pub ops: u64,

    /// Writes issued (`set` and `loneSet`)
    pub set: u64,

    /// Reads issued (`get` and `loneGet`)
    pub get: u64,

    /// Reads that did not find their key
    pub get_miss: u64,

    /// Deletes issued
    pub del: u64,

    /// Operations the cache engine failed
    pub errors: u64,
}

impl ThroughputStats {
    /// Create new empty stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write
    pub fn record_set(&mut self, ok: bool) {
        self.ops += 1;
        self.set += 1;
        self.errors += u64::from(!ok);
    }

    /// Record a read that completed with `hit`
    pub fn record_get(&mut self, hit: bool) {
        self.ops += 1;
        self.get += 1;
        self.get_miss += u64::from(!hit);
    }

    /// Record a read the engine failed
    pub fn record_get_error(&mut self) {
        self.ops += 1;
        self.get += 1;
        self.errors += 1;
    }

    /// Record a delete
    pub fn record_del(&mut self, ok: bool) {
        self.ops += 1;
        self.del += 1;
        self.errors += u64::from(!ok);
    }

    /// Record an operation kind that was not dispatched
    pub fn record_unsupported(&mut self) {
        self.ops += 1;
    }

    /// Operations counted in `ops` but in no per-kind counter
    pub fn unsupported(&self) -> u64 {
        self.ops.saturating_sub(self.set + self.get + self.del)
    }

    /// Fraction of reads that did not miss (0.0 - 1.0)
    pub fn hit_ratio(&self) -> f64 {
        if self.get == 0 {
            0.0
        } else {
            1.0 - self.get_miss as f64 / self.get as f64
        }
    }

    /// Merge stats from another worker
    pub fn merge(&mut self, other: &ThroughputStats) {
        self.ops += other.ops;
        self.set += other.set;
        self.get += other.get;
        self.get_miss += other.get_miss;
        self.del += other.del;
        self.errors += other.errors;
    }
}

impl AddAssign for ThroughputStats {
    fn add_assign(&mut self, rhs: Self) {
        self.merge(&rhs);
    }
}

impl Add for ThroughputStats {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl Sum for ThroughputStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl<'a> Sum<&'a ThroughputStats> for ThroughputStats {
    fn sum<I: Iterator<Item = &'a ThroughputStats>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(
        ops: u64,
        set: u64,
        get: u64,
        get_miss: u64,
        del: u64,
        errors: u64,
    ) -> ThroughputStats {
        ThroughputStats {
            ops,
            set,
            get,
            get_miss,
            del,
            errors,
        }
    }

    #[test]
    fn test_throughput_stats_defaults() {
        let stats = ThroughputStats::default();
        assert_eq!(stats.ops, 0);
        assert_eq!(stats.set, 0);
        assert_eq!(stats.get, 0);
        assert_eq!(stats.get_miss, 0);
        assert_eq!(stats.del, 0);
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.hit_ratio(), 0.0);
    }

    #[test]
    fn test_record_operations() {
        let mut stats = ThroughputStats::new();
        stats.record_set(true);
        stats.record_set(false);
        stats.record_get(true);
        stats.record_get(false);
        stats.record_get_error();
        stats.record_del(true);
        stats.record_unsupported();

        assert_eq!(stats.ops, 7);
        assert_eq!(stats.set, 2);
        assert_eq!(stats.get, 3);
        assert_eq!(stats.get_miss, 1);
        assert_eq!(stats.del, 1);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.unsupported(), 1);
        assert!(stats.get >= stats.get_miss);
    }

    #[test]
    fn test_get_error_is_not_a_miss() {
        let mut stats = ThroughputStats::new();
        stats.record_get_error();
        assert_eq!(stats.get, 1);
        assert_eq!(stats.get_miss, 0);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn test_hit_ratio() {
        let mut stats = ThroughputStats::new();
        for _ in 0..3 {
            stats.record_get(true);
        }
        stats.record_get(false);
        assert!((stats.hit_ratio() - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_merge() {
        let mut s1 = sample(10, 4, 5, 2, 1, 0);
        let s2 = sample(7, 2, 3, 3, 1, 1);

        s1.merge(&s2);

        assert_eq!(s1, sample(17, 6, 8, 5, 2, 1));
    }

    #[test]
    fn test_merge_is_order_independent() {
        let parts = [
            sample(10, 4, 5, 2, 1, 0),
            sample(7, 2, 3, 3, 1, 1),
            sample(3, 0, 3, 0, 0, 0),
        ];

        let forward: ThroughputStats = parts.iter().sum();
        let backward: ThroughputStats = parts.iter().rev().sum();
        let grouped = parts[0] + (parts[1] + parts[2]);

        assert_eq!(forward, backward);
        assert_eq!(forward, grouped);
        assert_eq!(forward.ops, 20);
    }

    #[test]
    fn test_sum_empty() {
        let total: ThroughputStats = std::iter::empty::<ThroughputStats>().sum();
        assert_eq!(total, ThroughputStats::default());
    }
}
