//! cachebench-core: Core harness for stress-testing cache engines
//!
//! This crate provides the pieces shared by every cachebench component,
//! including:
//!
//! - Request and result types (requests, op kinds, op outcomes)
//! - Core traits (CacheHandle, WorkloadSource)
//! - The worker loop and the multi-threaded Stressor driving it
//! - Throughput and cache statistics
//! - Configuration and error handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod request;
pub mod signal;
pub mod stressor;
pub mod traits;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use config::{
    BenchConfig, CacheConfig, ConfigError, KeyDistribution, StressorConfig, TestConfig,
    WorkloadConfig,
};
pub use error::*;
pub use metrics::*;
pub use request::*;
pub use signal::StopSignal;
pub use stressor::{aggregate_throughput_stats, RunSummary, Stressor, StressorBuilder};
pub use traits::*;
pub use worker::{RequestRateLimiter, ThroughputStats, Worker, WorkerBuilder, WorkerExit};
