//! Error types for cachebench-core

use thiserror::Error;

use crate::config::ConfigError;
use crate::traits::{CacheError, WorkloadError};

/// Core error type
///
/// Everything here is fatal for a run and is reported before any worker
/// thread starts, except [`BenchError::Spawn`] which can surface from
/// [`Stressor::start`](crate::Stressor::start).
#[derive(Error, Debug)]
pub enum BenchError {
    /// Invalid or inconsistent configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A required builder field was never set
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// The cache engine could not be opened or attached
    #[error("cache initialization failed: {0}")]
    CacheInit(#[source] CacheError),

    /// The workload source could not be constructed
    #[error("workload initialization failed: {0}")]
    Workload(#[source] WorkloadError),

    /// The OS refused to spawn a worker thread
    #[error("failed to spawn worker thread {thread}: {source}")]
    Spawn {
        /// Index of the thread that could not be spawned
        thread: usize,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenchError {
    /// Error for a builder field that was never provided
    pub fn missing_config(field: &'static str) -> Self {
        BenchError::MissingConfig(field)
    }

    /// Error for a cache engine that failed to open
    pub fn cache_init(err: CacheError) -> Self {
        BenchError::CacheInit(err)
    }

    /// Error for a workload source that failed to build
    pub fn workload(err: WorkloadError) -> Self {
        BenchError::Workload(err)
    }

    /// Whether this error stems from configuration rather than the environment
    pub fn is_config(&self) -> bool {
        matches!(self, BenchError::Config(_) | BenchError::MissingConfig(_))
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_message() {
        let err = BenchError::missing_config("cache");
        assert!(err.to_string().contains("cache"));
        assert!(err.is_config());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: BenchError = ConfigError::InvalidThreads("must be at least 1".into()).into();
        assert!(err.is_config());
        assert!(err.to_string().contains("must be at least 1"));
    }

    #[test]
    fn test_cache_init_is_not_config() {
        let err = BenchError::cache_init(CacheError::Closed);
        assert!(!err.is_config());
        assert!(err.to_string().starts_with("cache initialization failed"));
    }
}
