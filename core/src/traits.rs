//! Collaborator traits for cache engines and workload sources
//!
//! These traits are defined in core to avoid circular dependencies.
//! Implementations live in their respective crates (storage/, samplers/).
//!
//! Both collaborators are shared by every worker thread through an `Arc`;
//! the stressor adds no locking around calls, so implementations must be
//! internally thread-safe.

use rand::RngCore;

use crate::metrics::CacheStats;
use crate::request::{OpResult, PoolId, Request, RequestId};

// ============================================================================
// Cache Handle Trait
// ============================================================================

/// A key/value cache engine under test
pub trait CacheHandle: Send + Sync {
    /// Engine identifier (e.g., "memory")
    fn name(&self) -> &str;

    /// Store `value` under `key`
    fn set(&self, key: &str, value: &[u8], ttl_secs: u32) -> Result<(), CacheError>;

    /// Look up `key`; `Ok(None)` is a miss
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Remove `key`, returning whether it was present
    fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Approximate bytes of live data
    fn size(&self) -> u64;

    /// Drop all contents
    fn reset(&self) -> Result<(), CacheError>;

    /// Snapshot of the engine's own counters
    fn stats_snapshot(&self) -> CacheStats;
}

/// Cache engine errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Write would exceed the configured capacity
    #[error("Capacity exceeded: need {needed} bytes, {available} available")]
    CapacityExceeded {
        /// Bytes the write requires
        needed: u64,
        /// Bytes still free
        available: u64,
    },

    /// Persistence IO failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Persistence log is corrupt
    #[error("Corrupt persistence log: {0}")]
    Corrupt(String),

    /// An internal lock was poisoned by a panicking thread
    #[error("Lock poisoned: {0}")]
    Poisoned(&'static str),

    /// The engine was closed
    #[error("Cache is closed")]
    Closed,
}

// ============================================================================
// Workload Source Trait
// ============================================================================

/// Produces the requests a stressor executes
pub trait WorkloadSource: Send + Sync {
    /// Source name for identification
    fn name(&self) -> &str;

    /// Number of pools requests can be drawn from
    fn num_pools(&self) -> usize;

    /// Produce the next request for `pool`
    ///
    /// `last_request_id` is the id of the previous request returned to the
    /// calling worker, letting the source keep per-pool continuity.
    ///
    /// Returns `WorkloadError::Exhausted` when no more requests exist.
    fn next_request(
        &self,
        pool: PoolId,
        rng: &mut dyn RngCore,
        last_request_id: Option<RequestId>,
    ) -> Result<Request, WorkloadError>;

    /// A request carrying an id has been executed
    fn notify_result(&self, _request_id: RequestId, _result: OpResult) {}

    /// A worker thread has stopped asking for requests
    fn notify_thread_finished(&self) {}

    /// The run is over and every worker has been joined
    fn notify_shutdown(&self) {}
}

/// Workload source errors
#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    /// No more requests available for this run
    #[error("Workload exhausted")]
    Exhausted,

    /// Pool index out of range
    #[error("Unknown pool {pool} (source has {pools} pools)")]
    UnknownPool {
        /// Requested pool
        pool: PoolId,
        /// Number of pools the source serves
        pools: usize,
    },

    /// Invalid source configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed trace record
    #[error("Invalid trace record at line {line}: {reason}")]
    Trace {
        /// 1-based line number in the trace file
        line: u64,
        /// What is wrong with the record
        reason: String,
    },

    /// IO error (e.g., reading a trace file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkloadError {
    /// Whether this is the end-of-workload signal rather than a failure
    pub fn is_exhausted(&self) -> bool {
        matches!(self, WorkloadError::Exhausted)
    }
}
