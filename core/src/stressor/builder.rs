//! Builder pattern for Stressor construction

use std::sync::Arc;

use crate::config::{ConfigError, StressorConfig};
use crate::error::{BenchError, BenchResult};
use crate::traits::{CacheHandle, WorkloadSource};

use super::executor::Stressor;

/// Builder for creating a Stressor with validated configuration
///
/// # Example
///
/// ```ignore
/// let mut stressor = StressorBuilder::new()
///     .num_threads(4)
///     .num_ops(10_000)
///     .rate_limit(50_000)
///     .cache(cache)
///     .workload(workload)
///     .build()?;
/// ```
pub struct StressorBuilder {
    config: StressorConfig,
    cache: Option<Arc<dyn CacheHandle>>,
    workload: Option<Arc<dyn WorkloadSource>>,
    seed: Option<u64>,
}

impl StressorBuilder {
    /// Create a new stressor builder with default configuration
    pub fn new() -> Self {
        Self {
            config: StressorConfig::default(),
            cache: None,
            workload: None,
            seed: None,
        }
    }

    /// Set the full stressor configuration
    pub fn config(mut self, config: StressorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the number of worker threads
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.config.num_threads = num_threads;
        self
    }

    /// Set the per-thread operation quota
    pub fn num_ops(mut self, num_ops: u64) -> Self {
        self.config.num_ops = num_ops;
        self
    }

    /// Set the aggregate rate limit in ops/sec (0 disables it)
    pub fn rate_limit(mut self, ops_per_sec: u64) -> Self {
        self.config.op_rate_per_sec = ops_per_sec;
        self
    }

    /// Set the pool weights
    pub fn pool_distribution(mut self, weights: Vec<f64>) -> Self {
        self.config.op_pool_distribution = weights;
        self
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

    /// Seed worker RNGs (thread `i` uses `seed + i`)
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Build the stressor
    ///
    /// # Errors
    ///
    /// Returns an error if cache or workload are not set, if configuration
    /// validation fails, or if the pool weights do not match the number of
    /// pools the workload source serves.
    pub fn build(self) -> BenchResult<Stressor> {
        let cache = self
            .cache
            .ok_or_else(|| BenchError::missing_config("cache"))?;

        let workload = self
            .workload
            .ok_or_else(|| BenchError::missing_config("workload"))?;

        self.config.validate()?;

        let pools = workload.num_pools();
        if pools != self.config.num_pools() {
            return Err(ConfigError::PoolCountMismatch {
                configured: self.config.num_pools(),
                workload: pools,
            }
            .into());
        }

        let mut stressor = Stressor::new(self.config, cache, workload);
        stressor.seed = self.seed;
        Ok(stressor)
    }
}

impl Default for StressorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
