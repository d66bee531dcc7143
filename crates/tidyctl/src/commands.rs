//! Command implementations

use crate::output;
use crate::Domain;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Duration;
use tidy_common::{CleanResult, History, MemoryOptResult, SystemCounters, TidyConfig};
use tokio::sync::watch;
use tracing::{info, warn};

pub async fn run(config: &TidyConfig, history: History) -> Result<()> {
    if !config.sampler.enabled {
        warn!("Network sampler disabled in config, nothing to do");
        return Ok(());
    }
    if config.sampler.interval_was_clamped() {
        warn!(
            requested = config.sampler.interval_secs,
            effective = config.sampler.effective_interval_secs(),
            "Sample interval out of range, clamped"
        );
    }

    let interval = Duration::from_secs(config.sampler.effective_interval_secs());
    let sampler = history.network_sampler(SystemCounters, interval);
    info!(data_dir = %history.data_dir().display(), "Recording network history");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(sampler.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down gracefully");

    // Receiver may already be gone if the task ended on its own
    let _ = shutdown_tx.send(true);
    handle.await.context("Sampler task failed")?;
    Ok(())
}

pub fn record_clean(history: &History, freed_bytes: i64, count: u64, failed: u64) -> Result<()> {
    let result = CleanResult {
        freed_size: freed_bytes,
        cleaned_count: count,
        failed_count: failed,
    };
    history
        .record_clean(&result)
        .with_context(|| format!("Failed to write {}", history.clean_path().display()))?;
    output::success(&format!(
        "Recorded cleanup: {} freed, {} files",
        output::format_bytes(freed_bytes),
        count
    ));
    Ok(())
}

pub fn record_optimize(history: &History, freed_mb: f64, before: f64, after: f64) -> Result<()> {
    let result = MemoryOptResult {
        freed_mb,
        before_percent: before,
        after_percent: after,
        ..Default::default()
    };
    history
        .record_optimize(&result)
        .with_context(|| format!("Failed to write {}", history.memory_path().display()))?;
    output::success(&format!(
        "Recorded optimization: {:.1} MB freed ({:.1}% -> {:.1}%)",
        freed_mb, before, after
    ));
    Ok(())
}

pub fn stats(history: &History, domain: Domain, json: bool) -> Result<()> {
    match domain {
        Domain::Clean => {
            let stats = history.clean_stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                output::clean_stats(&stats);
            }
        }
        Domain::Memory => {
            let stats = history.memory_stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                output::memory_stats(&stats);
            }
        }
        Domain::Network => {
            let stats = history.network_stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                output::network_stats(&stats);
            }
        }
    }
    Ok(())
}

pub fn paths(config: &TidyConfig, history: &History, config_file: Option<&Path>) {
    let file = config_file
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string());
    output::field("config", &file);
    output::field("locale", config.history.locale.as_str());
    output::field("data dir", &history.data_dir().display().to_string());
    output::field("cleanup", &history.clean_path().display().to_string());
    output::field("memory", &history.memory_path().display().to_string());
    output::field("network", &history.network_path().display().to_string());
}

pub fn init_config(config: &TidyConfig, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", path.display());
    }
    config
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    output::success(&format!("Wrote config to {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tidy_common::Locale;

    #[test]
    fn test_init_config_writes_and_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tidy").join("config.toml");

        let mut config = TidyConfig::default();
        config.history.locale = Locale::Zh;
        init_config(&config, &path, false).unwrap();
        assert_eq!(TidyConfig::load_from(&path).unwrap().history.locale, Locale::Zh);

        config.history.locale = Locale::En;
        assert!(init_config(&config, &path, false).is_err());
        assert_eq!(TidyConfig::load_from(&path).unwrap().history.locale, Locale::Zh);

        init_config(&config, &path, true).unwrap();
        assert_eq!(TidyConfig::load_from(&path).unwrap().history.locale, Locale::En);
    }
}
