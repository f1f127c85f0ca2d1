//! `run` subcommand

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use cachebench_core::{BenchConfig, RunReport, StressorBuilder};
use cachebench_storage::MemoryCache;

/// Load the config, run the stressor to completion and print the report
///
/// Ctrl+C stops the workers after their current operation; the partial
/// results are still reported.
pub async fn run(config_path: &Path, output: Option<&Path>) -> Result<()> {
    let report = execute(config_path).await?;

    println!("{report}");

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Report written");
    }

    Ok(())
}

async fn execute(config_path: &Path) -> Result<RunReport> {
    let config = BenchConfig::from_file(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    config.validate().context("invalid configuration")?;

    let cache = MemoryCache::open(&config.cache_config).context("failed to open cache")?;
    let workload = cachebench_samplers::from_config(
        &config.test_config.workload,
        config.test_config.stressor.num_pools(),
    )
    .context("failed to build workload")?;

    let mut stressor = StressorBuilder::new()
        .config(config.test_config.stressor.clone())
        .cache(Arc::new(cache))
        .workload(workload)
        .build()?;

    let stop = stressor.stop_signal();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl+C, stopping workers");
            stop.stop();
        }
    });

    let stressor = tokio::task::spawn_blocking(move || -> Result<_> {
        let started = stressor.start();
        stressor.finish();
        started?;
        Ok(stressor)
    })
    .await
    .context("stressor task panicked")??;

    ctrl_c.abort();

    Ok(stressor.report())
}
