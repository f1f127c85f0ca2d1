//! Stressor execution logic

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::config::StressorConfig;
use crate::error::{BenchError, BenchResult};
use crate::metrics::{CacheStats, RunReport};
use crate::signal::StopSignal;
use crate::traits::{CacheHandle, WorkloadSource};
use crate::worker::{RequestRateLimiter, ThroughputStats, WorkerBuilder};

use super::aggregator::{aggregate_throughput_stats, RunSummary};

/// Stressor manages one benchmark run
///
/// Responsible for spawning one worker thread per configured thread,
/// coordinating shutdown, and collecting results. Dropping a Stressor waits
/// for its workers.
pub struct Stressor {
    /// Stressor configuration
    pub(crate) config: StressorConfig,

    /// Cache under test (shared across workers)
    pub(crate) cache: Arc<dyn CacheHandle>,

    /// Request source (shared across workers)
    pub(crate) workload: Arc<dyn WorkloadSource>,

    /// Aggregate rate limiter (shared across workers)
    pub(crate) rate_limiter: Arc<RequestRateLimiter>,

    /// Stop signal cloned into every worker
    pub(crate) stop: StopSignal,

    /// Fixed base seed for worker RNGs
    pub(crate) seed: Option<u64>,

    /// Running worker threads, by thread index
    handles: Vec<(usize, JoinHandle<ThroughputStats>)>,

    /// Final stats of joined workers
    thread_stats: Vec<ThroughputStats>,

    start_time: Option<Instant>,
    end_time: Option<Instant>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl Stressor {
    /// Create a new stressor
    ///
    /// Use `StressorBuilder` for a validated construction.
    pub fn new(
        config: StressorConfig,
        cache: Arc<dyn CacheHandle>,
        workload: Arc<dyn WorkloadSource>,
    ) -> Self {
        let rate_limiter = Arc::new(RequestRateLimiter::new(config.rate_limit()));

        Self {
            config,
            cache,
            workload,
            rate_limiter,
            stop: StopSignal::new(),
            seed: None,
            handles: Vec::new(),
            thread_stats: Vec::new(),
            start_time: None,
            end_time: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Record the start time and spawn the worker threads
    ///
    /// # Errors
    /// Returns an error if a worker cannot be built or the OS refuses to
    /// spawn a thread. Threads already running are told to stop and are
    /// joined by the next [`Stressor::finish`].
    pub fn start(&mut self) -> BenchResult<()> {
        self.start_time.get_or_insert_with(Instant::now);
        self.started_at.get_or_insert_with(Utc::now);

        tracing::info!(
            num_threads = self.config.num_threads,
            num_ops = self.config.num_ops,
            rate_limit = ?self.config.rate_limit(),
            pools = self.config.num_pools(),
            cache = self.cache.name(),
            workload = self.workload.name(),
            "Starting stressor"
        );

        for tid in 0..self.config.num_threads {
            let worker = WorkerBuilder::new(tid)
                .cache(Arc::clone(&self.cache))
                .workload(Arc::clone(&self.workload))
                .rate_limiter(Arc::clone(&self.rate_limiter))
                .stop_signal(self.stop.clone())
                .num_ops(self.config.num_ops)
                .pool_distribution(self.config.op_pool_distribution.clone())
                .seed(self.seed.map(|seed| seed.wrapping_add(tid as u64)))
                .build();
            let worker = match worker {
                Ok(worker) => worker,
                Err(e) => {
                    self.stop.stop();
                    return Err(e);
                }
            };

            let spawned = std::thread::Builder::new()
                .name(format!("stressor-{tid}"))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => self.handles.push((tid, handle)),
                Err(source) => {
                    tracing::error!(
                        worker_id = tid,
                        error = %source,
                        "Failed to spawn worker thread"
                    );
                    self.stop.stop();
                    return Err(BenchError::Spawn { thread: tid, source });
                }
            }
        }

        Ok(())
    }

    /// Wait for every worker, record the end time and notify the workload source
    ///
    /// Calling this again after the workers have been joined does nothing.
    pub fn finish(&mut self) {
        if self.handles.is_empty() && (self.end_time.is_some() || self.start_time.is_none()) {
            return;
        }

        let mut worker_failures = 0;
        for (tid, handle) in self.handles.drain(..) {
            match handle.join() {
                Ok(stats) => {
                    tracing::debug!(worker_id = tid, ops = stats.ops, "Worker joined");
                    self.thread_stats.push(stats);
                }
                Err(_) => {
                    worker_failures += 1;
                    tracing::error!(worker_id = tid, "Worker thread panicked");
                }
            }
        }

        self.end_time = Some(Instant::now());
        self.ended_at = Some(Utc::now());
        self.workload.notify_shutdown();

        let summary = self.summary();
        tracing::info!(
            elapsed_secs = summary.duration.as_secs_f64(),
            ops = summary.stats.ops,
            ops_per_sec = summary.ops_per_sec,
            worker_failures,
            "Stressor finished"
        );
    }

    /// Start, wait for completion, and summarize
    pub fn run(&mut self) -> BenchResult<RunSummary> {
        let started = self.start();
        self.finish();
        started?;
        Ok(self.summary())
    }

    /// Ask every worker to stop after its current operation
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Handle for stopping the run from elsewhere (e.g. a signal handler)
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Snapshot of the cache engine's own counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats_snapshot()
    }

    /// Sum of every joined worker's stats
    ///
    /// Complete only after [`Stressor::finish`].
    pub fn aggregate_throughput_stats(&self) -> ThroughputStats {
        aggregate_throughput_stats(&self.thread_stats)
    }

    /// Stats of each joined worker, in join order
    pub fn thread_stats(&self) -> &[ThroughputStats] {
        &self.thread_stats
    }

    /// Nanoseconds between start and finish; 0 before `finish`
    pub fn test_duration_ns(&self) -> u64 {
        u64::try_from(self.test_duration().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Time between start and finish; zero before `finish`
    pub fn test_duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start),
            _ => Duration::ZERO,
        }
    }

    /// Whether `finish` has joined every worker
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some() && self.handles.is_empty()
    }

    /// Aggregated stats with derived rates
    pub fn summary(&self) -> RunSummary {
        RunSummary::new(
            self.thread_stats.len(),
            self.aggregate_throughput_stats(),
            self.test_duration(),
        )
    }

    /// Full report of the run, including engine counters
    pub fn report(&self) -> RunReport {
        RunReport {
            engine: self.cache.name().to_string(),
            workload: self.workload.name().to_string(),
            num_threads: self.config.num_threads,
            started_at: self.started_at.unwrap_or_else(Utc::now),
            ended_at: self.ended_at,
            summary: self.summary(),
            cache: self.cache_stats(),
        }
    }

    /// Get the stressor configuration
    pub fn config(&self) -> &StressorConfig {
        &self.config
    }
}

impl Drop for Stressor {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for Stressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stressor")
            .field("config", &self.config)
            .field("cache", &self.cache.name())
            .field("workload", &self.workload.name())
            .field("rate_limiter", &self.rate_limiter)
            .field("running_threads", &self.handles.len())
            .finish()
    }
}
