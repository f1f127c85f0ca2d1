//! Builder pattern for Worker construction

use crate::config::{validate_weights, ConfigError};
use crate::error::{BenchError, BenchResult};
use crate::signal::StopSignal;
use crate::traits::{CacheHandle, WorkloadSource};

use super::executor::Worker;
use super::rate_limiter::RequestRateLimiter;

use rand::distributions::WeightedIndex;
use std::sync::Arc;

/// Builder for creating Worker instances
///
/// Provides ergonomic construction with validation.
///
/// # Example
/// ```ignore
/// let worker = WorkerBuilder::new(0)
///     .cache(cache)
///     .workload(workload)
///     .rate_limiter(limiter)
///     .stop_signal(stop.clone())
///     .num_ops(1000)
///     .pool_distribution(vec![0.7, 0.3])
///     .build()?;
///
/// let stats = worker.run();
/// println!("Executed: {}", stats.ops);
/// ```
pub struct WorkerBuilder {
    id: usize,
    cache: Option<Arc<dyn CacheHandle>>,
    workload: Option<Arc<dyn WorkloadSource>>,
    rate_limiter: Option<Arc<RequestRateLimiter>>,
    stop: Option<StopSignal>,
    num_ops: Option<u64>,
    pool_distribution: Vec<f64>,
    seed: Option<u64>,
}

impl WorkerBuilder {
    /// Create a new builder with the given worker ID
    pub fn new(id: usize) -> Self {
        Self {
            id,
            cache: None,
            workload: None,
            rate_limiter: None,
            stop: None,
            num_ops: None,
            pool_distribution: vec![1.0],
            seed: None,
        }
    }

    /// Set the cache under test
    pub fn cache(mut self, cache: Arc<dyn CacheHandle>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the workload source
    pub fn workload(mut self, workload: Arc<dyn WorkloadSource>) -> Self {
        self.workload = Some(workload);
        self
    }

    /// Set the shared rate limiter (unlimited when not set)
    pub fn rate_limiter(mut self, limiter: Arc<RequestRateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Set the stop signal (a private one when not set)
    pub fn stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Set the operation quota
    pub fn num_ops(mut self, num_ops: u64) -> Self {
        self.num_ops = Some(num_ops);
        self
    }

    /// Set the pool selection weights (a single pool when not set)
    pub fn pool_distribution(mut self, weights: Vec<f64>) -> Self {
        self.pool_distribution = weights;
        self
    }

    /// Fix the worker's RNG seed
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Build the Worker
    ///
    /// # Errors
    /// Returns an error if any required field is missing or the pool
    /// weights do not form a valid distribution.
    pub fn build(self) -> BenchResult<Worker> {
        let cache = self.cache.ok_or(BenchError::missing_config("cache"))?;
        let workload = self
            .workload
            .ok_or(BenchError::missing_config("workload"))?;
        let num_ops = self.num_ops.ok_or(BenchError::missing_config("num_ops"))?;

        validate_weights(&self.pool_distribution).map_err(ConfigError::InvalidPoolDistribution)?;
        let pool_distribution = WeightedIndex::new(&self.pool_distribution)
            .map_err(|e| ConfigError::InvalidPoolDistribution(e.to_string()))?;

        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(RequestRateLimiter::unlimited()));

        Ok(Worker::new(
            self.id,
            cache,
            workload,
            rate_limiter,
            self.stop.unwrap_or_default(),
            num_ops,
            pool_distribution,
            self.seed,
        ))
    }
}
