//! `validate` subcommand

use std::path::Path;

use anyhow::{Context, Result};

use cachebench_core::BenchConfig;

/// Check a config file and the workload it describes without running anything
pub fn validate(config_path: &Path) -> Result<()> {
    let config = BenchConfig::from_file(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    config.validate().context("invalid configuration")?;

    let stressor = &config.test_config.stressor;
    let workload = &config.test_config.workload;

    // Loading the trace catches malformed rows and pool mismatches up front.
    let mode = match &workload.trace_file {
        Some(path) => {
            let source = cachebench_samplers::from_config(workload, stressor.num_pools())
                .with_context(|| format!("failed to load trace {}", path.display()))?;
            if source.num_pools() != stressor.num_pools() {
                anyhow::bail!(
                    "trace has {} pools but opPoolDistribution has {} weights",
                    source.num_pools(),
                    stressor.num_pools()
                );
            }
            format!("trace replay ({})", path.display())
        }
        None => format!(
            "synthetic ({} keys, {:?} popularity)",
            workload.num_keys, workload.distribution
        ),
    };

    println!("Configuration is valid");
    println!("  Threads     : {}", stressor.num_threads);
    println!("  Ops/thread  : {}", stressor.num_ops);
    println!(
        "  Rate limit  : {}",
        stressor
            .rate_limit()
            .map_or_else(|| "unlimited".to_string(), |r| format!("{r} ops/sec"))
    );
    println!("  Pools       : {}", stressor.num_pools());
    println!("  Workload    : {mode}");
    println!("  Cache       : {} MB", config.cache_config.cache_size_mb);

    Ok(())
}
