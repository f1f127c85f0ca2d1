//! Cache engines for cachebench
//!
//! This crate provides the `CacheHandle` implementation the benchmark runs
//! against:
//!
//! - [`MemoryCache`]: a sharded concurrent map with a byte capacity and
//!   per-item TTL
//! - An optional append-only persistence log, replayed when the cache is
//!   reopened from the same directory

#![warn(missing_docs)]
#![warn(clippy::all)]

mod log;
mod memory;

pub use log::LOG_FILE_NAME;
pub use memory::MemoryCache;
