//! Benchmark configuration types
//!
//! A configuration file has two sections, `cache_config` and `test_config`,
//! with camelCase keys inside each section:
//!
//! ```json
//! {
//!   "cache_config": { "cacheSizeMB": 64 },
//!   "test_config": { "numOps": 1000, "numThreads": 4, "getRatio": 0.9, "setRatio": 0.1 }
//! }
//! ```
//!
//! Keys that cachebench does not recognize are ignored, so configs produced
//! for other cache backends can be reused unchanged.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::BenchResult;

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchConfig {
    /// Options forwarded to the cache engine
    #[serde(default)]
    pub cache_config: CacheConfig,

    /// Stressor and workload options
    #[serde(default)]
    pub test_config: TestConfig,
}

impl BenchConfig {
    /// Load a configuration from a JSON file
    ///
    /// The file is parsed but not validated; call [`BenchConfig::validate`].
    pub fn from_file(path: impl AsRef<Path>) -> BenchResult<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let config = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }

    /// Parse a configuration from a JSON string
    pub fn from_json_str(json: &str) -> BenchResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache_config.validate()?;
        self.test_config.stressor.validate()?;
        self.test_config.workload.validate()?;

        // Synthetic workloads split the key space evenly across pools.
        let pools = self.test_config.stressor.op_pool_distribution.len();
        let workload = &self.test_config.workload;
        if workload.trace_file.is_none() && workload.num_keys < pools {
            return Err(ConfigError::InvalidKeys(format!(
                "numKeys ({}) must be at least the number of pools ({pools})",
                self.test_config.workload.num_keys
            )));
        }

        Ok(())
    }
}

/// Cache engine options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Capacity of the cache in MiB
    #[serde(rename = "cacheSizeMB", default = "default_cache_size_mb")]
    pub cache_size_mb: u64,

    /// Directory holding the persistence log; `None` keeps the cache in memory only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence_path: Option<PathBuf>,

    /// Flush every persistence log append to stable storage
    #[serde(default)]
    pub sync_writes: bool,
}

fn default_cache_size_mb() -> u64 {
    64
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_size_mb: default_cache_size_mb(),
            persistence_path: None,
            sync_writes: false,
        }
    }
}

impl CacheConfig {
    /// Capacity in bytes
    pub fn capacity_bytes(&self) -> u64 {
        self.cache_size_mb.saturating_mul(1024 * 1024)
    }

    /// Validate the cache options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_size_mb == 0 {
            return Err(ConfigError::InvalidCacheSize(
                "cacheSizeMB must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// The `test_config` section: stressor options and workload options side by side
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestConfig {
    /// Thread count, per-thread quota, rate limit and pool weights
    #[serde(flatten)]
    pub stressor: StressorConfig,

    /// Key space, size distributions and operation mix
    #[serde(flatten)]
    pub workload: WorkloadConfig,
}

/// Stressor options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressorConfig {
    /// Number of worker threads
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,

    /// Operations executed by each worker thread
    #[serde(default = "default_num_ops")]
    pub num_ops: u64,

    /// Aggregate operations per second across all threads; 0 disables limiting
    #[serde(default)]
    pub op_rate_per_sec: u64,

    /// Relative weight of each pool when choosing where an operation goes
    #[serde(default = "default_pool_distribution")]
    pub op_pool_distribution: Vec<f64>,
}

fn default_num_threads() -> usize {
    1
}

fn default_num_ops() -> u64 {
    100
}

fn default_pool_distribution() -> Vec<f64> {
    vec![1.0]
}

impl Default for StressorConfig {
    fn default() -> Self {
        Self {
            num_threads: default_num_threads(),
            num_ops: default_num_ops(),
            op_rate_per_sec: 0,
            op_pool_distribution: default_pool_distribution(),
        }
    }
}

impl StressorConfig {
    /// Create a config with the given thread count and per-thread quota
    pub fn new(num_threads: usize, num_ops: u64) -> Self {
        Self {
            num_threads,
            num_ops,
            ..Default::default()
        }
    }

    /// Set the aggregate rate limit
    pub fn with_rate_limit(mut self, ops_per_sec: u64) -> Self {
        self.op_rate_per_sec = ops_per_sec;
        self
    }

    /// Set the pool weights
    pub fn with_pool_distribution(mut self, weights: Vec<f64>) -> Self {
        self.op_pool_distribution = weights;
        self
    }

    /// Rate limit as consumed by the rate limiter (`None` when disabled)
    pub fn rate_limit(&self) -> Option<f64> {
        (self.op_rate_per_sec > 0).then_some(self.op_rate_per_sec as f64)
    }

    /// Number of pools implied by the distribution
    pub fn num_pools(&self) -> usize {
        self.op_pool_distribution.len()
    }

    /// Validate the stressor options
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_threads == 0 {
            return Err(ConfigError::InvalidThreads(
                "numThreads must be at least 1".into(),
            ));
        }
        if self.num_ops == 0 {
            return Err(ConfigError::InvalidOps("numOps must be at least 1".into()));
        }
        if self.op_rate_per_sec > u64::from(u32::MAX) {
            return Err(ConfigError::InvalidRateLimit(format!(
                "opRatePerSec must not exceed {}",
                u32::MAX
            )));
        }
        validate_weights(&self.op_pool_distribution).map_err(ConfigError::InvalidPoolDistribution)
    }
}

/// How keys within a pool are chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyDistribution {
    /// Every key is equally likely
    #[default]
    Range,
    /// Keys near the middle of the pool's key range are hottest
    Normal,
}

/// Workload generator options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadConfig {
    /// Total number of distinct keys, split evenly across pools
    #[serde(default = "default_num_keys")]
    pub num_keys: usize,

    /// Key size bucket boundaries in bytes
    #[serde(default = "default_key_size_range")]
    pub key_size_range: Vec<u32>,

    /// Weight of each key size bucket (one fewer than the boundaries)
    #[serde(default = "default_single_bucket")]
    pub key_size_range_probability: Vec<f64>,

    /// Value size bucket boundaries in bytes
    #[serde(default = "default_val_size_range")]
    pub val_size_range: Vec<u32>,

    /// Weight of each value size bucket (one fewer than the boundaries)
    #[serde(default = "default_single_bucket")]
    pub val_size_range_probability: Vec<f64>,

    /// Weight of reads on the key population
    #[serde(default = "default_half_ratio")]
    pub get_ratio: f64,

    /// Weight of writes on the key population
    #[serde(default = "default_half_ratio")]
    pub set_ratio: f64,

    /// Weight of deletes
    #[serde(default)]
    pub del_ratio: f64,

    /// Weight of reads of keys outside the population
    #[serde(default)]
    pub lone_get_ratio: f64,

    /// Weight of writes that are never read back
    #[serde(default)]
    pub lone_set_ratio: f64,

    /// Weight of in-place updates (not dispatched by the stressor)
    #[serde(default)]
    pub update_ratio: f64,

    /// Key popularity within a pool
    #[serde(default)]
    pub distribution: KeyDistribution,

    /// TTL attached to writes, in seconds (0 = no expiry)
    #[serde(default)]
    pub ttl_secs: u32,

    /// Replay requests from this CSV trace instead of generating them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_file: Option<PathBuf>,
}

fn default_num_keys() -> usize {
    10_000
}

fn default_key_size_range() -> Vec<u32> {
    vec![8, 16]
}

fn default_val_size_range() -> Vec<u32> {
    vec![64, 512]
}

fn default_single_bucket() -> Vec<f64> {
    vec![1.0]
}

fn default_half_ratio() -> f64 {
    0.5
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            num_keys: default_num_keys(),
            key_size_range: default_key_size_range(),
            key_size_range_probability: default_single_bucket(),
            val_size_range: default_val_size_range(),
            val_size_range_probability: default_single_bucket(),
            get_ratio: default_half_ratio(),
            set_ratio: default_half_ratio(),
            del_ratio: 0.0,
            lone_get_ratio: 0.0,
            lone_set_ratio: 0.0,
            update_ratio: 0.0,
            distribution: KeyDistribution::Range,
            ttl_secs: 0,
            trace_file: None,
        }
    }
}

impl WorkloadConfig {
    /// Operation weights in the order set, get, del, loneGet, loneSet, update
    pub fn op_ratios(&self) -> [f64; 6] {
        [
            self.set_ratio,
            self.get_ratio,
            self.del_ratio,
            self.lone_get_ratio,
            self.lone_set_ratio,
            self.update_ratio,
        ]
    }

    /// Validate the workload options
    ///
    /// Trace replay ignores the key space and operation mix, so only the
    /// trace path is required in that mode.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trace_file.is_some() {
            return Ok(());
        }

        if self.num_keys == 0 {
            return Err(ConfigError::InvalidKeys("numKeys must be at least 1".into()));
        }

        validate_size_range(
            "keySizeRange",
            &self.key_size_range,
            &self.key_size_range_probability,
        )?;
        if self.key_size_range[0] == 0 {
            return Err(ConfigError::InvalidSizeRange {
                field: "keySizeRange",
                reason: "keys must be at least 1 byte".into(),
            });
        }
        validate_size_range(
            "valSizeRange",
            &self.val_size_range,
            &self.val_size_range_probability,
        )?;

        validate_weights(&self.op_ratios()).map_err(ConfigError::InvalidOpRatios)
    }
}

/// Check a discrete distribution: non-empty, finite, non-negative, positive sum
pub fn validate_weights(weights: &[f64]) -> Result<(), String> {
    if weights.is_empty() {
        return Err("at least one weight is required".into());
    }
    if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(format!("weights must be finite and non-negative, got {w}"));
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err("weights must sum to a positive value".into());
    }
    Ok(())
}

fn validate_size_range(
    field: &'static str,
    bounds: &[u32],
    probabilities: &[f64],
) -> Result<(), ConfigError> {
    if bounds.len() < 2 {
        return Err(ConfigError::InvalidSizeRange {
            field,
            reason: "at least two boundaries are required".into(),
        });
    }
    if bounds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ConfigError::InvalidSizeRange {
            field,
            reason: "boundaries must be strictly increasing".into(),
        });
    }
    if probabilities.len() != bounds.len() - 1 {
        return Err(ConfigError::InvalidSizeRange {
            field,
            reason: format!(
                "expected {} probabilities for {} boundaries, got {}",
                bounds.len() - 1,
                bounds.len(),
                probabilities.len()
            ),
        });
    }
    validate_weights(probabilities)
        .map_err(|reason| ConfigError::InvalidSizeRange { field, reason })
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid thread count
    #[error("Invalid thread count: {0}")]
    InvalidThreads(String),

    /// Invalid per-thread operation count
    #[error("Invalid operation count: {0}")]
    InvalidOps(String),

    /// Invalid rate limit
    #[error("Invalid rate limit: {0}")]
    InvalidRateLimit(String),

    /// Invalid pool weights
    #[error("Invalid pool distribution: {0}")]
    InvalidPoolDistribution(String),

    /// Pool weights disagree with the workload source
    #[error(
        "Pool count mismatch: distribution has {configured} weights \
         but the workload has {workload} pools"
    )]
    PoolCountMismatch {
        /// Number of configured weights
        configured: usize,
        /// Number of pools the workload source serves
        workload: usize,
    },

    /// Invalid key or value size distribution
    #[error("Invalid {field}: {reason}")]
    InvalidSizeRange {
        /// Offending config key
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Invalid operation mix
    #[error("Invalid operation ratios: {0}")]
    InvalidOpRatios(String),

    /// Invalid key space
    #[error("Invalid key space: {0}")]
    InvalidKeys(String),

    /// Invalid cache size
    #[error("Invalid cache size: {0}")]
    InvalidCacheSize(String),
}
