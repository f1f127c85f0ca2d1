//! Workload sources for cachebench
//!
//! This crate provides implementations of the `WorkloadSource` trait for:
//!
//! - Synthetic workloads drawn from key/value size and operation-mix
//!   distributions ([`SyntheticWorkload`])
//! - Replay of recorded CSV traces ([`TraceReplay`])

#![warn(missing_docs)]
#![warn(clippy::all)]

mod synthetic;
mod trace;

pub use synthetic::SyntheticWorkload;
pub use trace::TraceReplay;

use std::sync::Arc;

use cachebench_core::{WorkloadConfig, WorkloadError, WorkloadSource};

/// Build the workload source a configuration asks for
///
/// A `traceFile` selects trace replay; otherwise a synthetic generator with
/// `num_pools` pools is built.
pub fn from_config(
    config: &WorkloadConfig,
    num_pools: usize,
) -> Result<Arc<dyn WorkloadSource>, WorkloadError> {
    match &config.trace_file {
        Some(path) => Ok(Arc::new(TraceReplay::from_path(path)?)),
        None => Ok(Arc::new(SyntheticWorkload::new(config, num_pools)?)),
    }
}
