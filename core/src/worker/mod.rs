//! Worker module for executing cache operations
//!
//! The Worker is the core execution unit in cachebench, responsible for the
//! simple but critical loop: **pick pool -> fetch request -> dispatch -> count**.
//!
//! Each Worker runs on a dedicated OS thread for the whole run and:
//!
//! 1. Checks the shared stop signal
//! 2. Waits on the shared rate limiter, if one is configured
//! 3. Samples a pool from its own weighted distribution
//! 4. Fetches the next request for that pool from the WorkloadSource
//! 5. Executes it against the CacheHandle and updates its ThroughputStats
//! 6. Reports the result back to the source when the request carries an id
//! 7. Repeats until its quota is met or the source is exhausted
//!
//! # Example
//!
//! ```ignore
//! use cachebench_core::worker::WorkerBuilder;
//!
//! let worker = WorkerBuilder::new(0)
//!     .cache(cache)
//!     .workload(workload)
//!     .num_ops(100)
//!     .build()?;
//!
//! let stats = std::thread::spawn(move || worker.run()).join().unwrap();
//! println!("Executed: {}", stats.ops);
//! ```

mod builder;
mod executor;
mod rate_limiter;
mod stats;

pub use builder::WorkerBuilder;
pub use executor::{Worker, WorkerExit};
pub use rate_limiter::RequestRateLimiter;
pub use stats::ThroughputStats;
