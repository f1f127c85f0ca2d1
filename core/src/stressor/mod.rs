//! Stressor for benchmark run lifecycle management
//!
//! The Stressor coordinates one complete run:
//! - Spawning one worker thread per configured thread
//! - Sharing a single rate limiter across all workers
//! - Stopping early through a shared stop signal
//! - Joining workers and aggregating their stats
//!
//! # Example
//!
//! ```ignore
//! use cachebench_core::StressorBuilder;
//!
//! let mut stressor = StressorBuilder::new()
//!     .num_threads(4)
//!     .num_ops(1000)
//!     .cache(cache)
//!     .workload(workload)
//!     .build()?;
//!
//! stressor.start()?;
//! stressor.finish();
//! println!("{}", stressor.report());
//! ```

mod aggregator;
mod builder;
mod executor;

pub use aggregator::{aggregate_throughput_stats, RunSummary};
pub use builder::StressorBuilder;
pub use executor::Stressor;
