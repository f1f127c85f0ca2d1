//! Worker execution loop

use crate::request::{OpResult, OpType, Request, RequestId};
use crate::signal::StopSignal;
use crate::traits::{CacheHandle, WorkloadError, WorkloadSource};

use super::rate_limiter::RequestRateLimiter;
use super::stats::ThroughputStats;

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Progress is traced every this many operations per worker.
const LOG_EVERY: u64 = 100;

/// Why a worker left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Executed its full operation quota
    Completed,
    /// Observed the stop signal
    Stopped,
    /// The workload source ran out of requests
    Exhausted,
    /// The workload source failed
    SourceFailed,
}

/// Worker executes operations in a loop: pick pool -> fetch -> dispatch -> count
///
/// Each worker runs on its own OS thread, owned by the Stressor. The cache
/// handle, workload source and rate limiter are shared via Arc; the stats
/// and the random generator belong to the worker alone.
pub struct Worker {
    /// Thread index in `[0, num_threads)`
    id: usize,

    /// Cache under test (shared across workers)
    cache: Arc<dyn CacheHandle>,

    /// Request source (shared across workers)
    workload: Arc<dyn WorkloadSource>,

    /// Aggregate rate limiter (shared across workers)
    rate_limiter: Arc<RequestRateLimiter>,

    /// Cooperative cancellation
    stop: StopSignal,

    /// Operation quota for this worker
    num_ops: u64,

    /// Pool selection weights
    pool_distribution: WeightedIndex<f64>,

    /// Fixed RNG seed; drawn from the process RNG when absent
    seed: Option<u64>,
}

impl Worker {
    /// Create a new worker
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        cache: Arc<dyn CacheHandle>,
        workload: Arc<dyn WorkloadSource>,
        rate_limiter: Arc<RequestRateLimiter>,
        stop: StopSignal,
        num_ops: u64,
        pool_distribution: WeightedIndex<f64>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            id,
            cache,
            workload,
            rate_limiter,
            stop,
            num_ops,
            pool_distribution,
            seed,
        }
    }

    /// Run the worker loop on the calling thread
    ///
    /// Returns the worker's final stats once the quota is met, the stop
    /// signal is observed, or the workload source is exhausted. The source
    /// is told exactly once that this thread has finished.
    pub fn run(self) -> ThroughputStats {
        self.run_with_exit().0
    }

    /// Run the worker loop, also reporting why it ended
    pub fn run_with_exit(self) -> (ThroughputStats, WorkerExit) {
        let mut stats = ThroughputStats::new();
        let mut rng = StdRng::seed_from_u64(self.seed.unwrap_or_else(rand::random));
        let mut last_request_id: Option<RequestId> = None;
        let mut payload = Vec::new();

        tracing::debug!(worker_id = self.id, num_ops = self.num_ops, "Worker started");

        let exit = loop {
            if stats.ops >= self.num_ops {
                break WorkerExit::Completed;
            }

            if self.stop.is_stopped() {
                tracing::debug!(
                    worker_id = self.id,
                    ops = stats.ops,
                    "Worker received stop signal"
                );
                break WorkerExit::Stopped;
            }

            self.rate_limiter.wait();

            let pool = self.pool_distribution.sample(&mut rng);
            let request = match self.workload.next_request(pool, &mut rng, last_request_id) {
                Ok(request) => request,
                Err(WorkloadError::Exhausted) => {
                    tracing::debug!(worker_id = self.id, ops = stats.ops, "Workload exhausted");
                    break WorkerExit::Exhausted;
                }
                Err(e) => {
                    tracing::warn!(worker_id = self.id, pool, error = %e, "Workload source failed");
                    break WorkerExit::SourceFailed;
                }
            };
            last_request_id = request.id;

            let result = self.execute(&request, &mut stats, &mut payload);

            if let Some(id) = request.id {
                self.workload.notify_result(id, result);
            }

            if stats.ops % LOG_EVERY == 0 {
                tracing::trace!(worker_id = self.id, ops = stats.ops, "Worker progress");
            }
        };

        self.workload.notify_thread_finished();

        tracing::debug!(
            worker_id = self.id,
            ops = stats.ops,
            set = stats.set,
            get = stats.get,
            get_miss = stats.get_miss,
            del = stats.del,
            errors = stats.errors,
            exit = ?exit,
            "Worker finished"
        );

        (stats, exit)
    }

    /// Dispatch one request to the cache and count it
    ///
    /// Engine errors are counted and logged, never propagated.
    fn execute(
        &self,
        request: &Request,
        stats: &mut ThroughputStats,
        payload: &mut Vec<u8>,
    ) -> OpResult {
        match request.op {
            OpType::Set | OpType::LoneSet => {
                let size = request.size.unwrap_or(0);
                if payload.len() < size {
                    payload.resize(size, b'x');
                }
                match self.cache.set(&request.key, &payload[..size], request.ttl_secs) {
                    Ok(()) => {
                        stats.record_set(true);
                        OpResult::SetSuccess
                    }
                    Err(e) => {
                        stats.record_set(false);
                        tracing::debug!(
                            worker_id = self.id,
                            key = %request.key,
                            error = %e,
                            "Set failed"
                        );
                        OpResult::SetFailure
                    }
                }
            }
            OpType::Get | OpType::LoneGet => match self.cache.get(&request.key) {
                Ok(Some(_)) => {
                    stats.record_get(true);
                    OpResult::GetHit
                }
                Ok(None) => {
                    stats.record_get(false);
                    OpResult::GetMiss
                }
                Err(e) => {
                    stats.record_get_error();
                    tracing::debug!(
                        worker_id = self.id,
                        key = %request.key,
                        error = %e,
                        "Get failed"
                    );
                    OpResult::Error
                }
            },
            OpType::Del => match self.cache.delete(&request.key) {
                Ok(found) => {
                    stats.record_del(true);
                    if found {
                        OpResult::DelSuccess
                    } else {
                        OpResult::DelNotFound
                    }
                }
                Err(e) => {
                    stats.record_del(false);
                    tracing::debug!(
                        worker_id = self.id,
                        key = %request.key,
                        error = %e,
                        "Delete failed"
                    );
                    OpResult::Error
                }
            },
            OpType::Update | OpType::AddChained | OpType::CouldExist => {
                stats.record_unsupported();
                OpResult::Nop
            }
        }
    }

    /// Get the worker ID
    pub fn id(&self) -> usize {
        self.id
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("cache", &self.cache.name())
            .field("workload", &self.workload.name())
            .field("rate_limiter", &self.rate_limiter)
            .field("num_ops", &self.num_ops)
            .finish()
    }
}
