//! History facade: one entry point per domain.
//!
//! Cleanup and memory events are recorded right after the action that
//! produced them. Network traffic arrives through [`NetworkSampler`].
//! Stats are rebuilt from disk on every call.

use crate::config::{HistorySettings, TidyConfig};
use crate::datadir;
use crate::error::Result;
use crate::record::{
    CleanRecord, CleanResult, MemOptRecord, MemoryOptResult, NetTrafficRecord,
};
use crate::rollup::{self, RollupOptions};
use crate::sampler::{CounterSource, NetworkSampler};
use crate::stats::{CleanStats, MemOptStats, NetTrafficStats};
use crate::store::{AppendOutcome, RecordStore};
use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub struct History {
    data_dir: PathBuf,
    clean: RecordStore<CleanRecord>,
    memory: RecordStore<MemOptRecord>,
    network: Arc<RecordStore<NetTrafficRecord>>,
    rollup: RollupOptions,
}

impl History {
    pub fn open<P: AsRef<Path>>(data_dir: P, settings: &HistorySettings) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        let retention = settings.effective_retention_days();

        Self {
            clean: RecordStore::new(&data_dir),
            memory: RecordStore::new(&data_dir).with_retention_days(retention),
            network: Arc::new(RecordStore::new(&data_dir).with_retention_days(retention)),
            rollup: RollupOptions {
                daily_window_days: settings.effective_daily_window_days(),
                recent_records: settings.effective_recent_records(),
                locale: settings.locale,
            },
            data_dir,
        }
    }

    /// Open the history in the data directory resolved from `config`
    pub fn from_config(config: &TidyConfig) -> Self {
        Self::open(datadir::resolve(config), &config.history)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn clean_path(&self) -> &Path {
        self.clean.path()
    }

    pub fn memory_path(&self) -> &Path {
        self.memory.path()
    }

    pub fn network_path(&self) -> &Path {
        self.network.path()
    }

    // ---- cleanup ----

    pub fn record_clean(&self, result: &CleanResult) -> Result<()> {
        self.record_clean_at(result, local_now())
    }

    pub fn record_clean_at(&self, result: &CleanResult, now: NaiveDateTime) -> Result<()> {
        self.clean.append(CleanRecord::new(now, result), now)?;
        info!(
            freed = result.freed_size,
            cleaned = result.cleaned_count,
            failed = result.failed_count,
            "Cleanup recorded"
        );
        Ok(())
    }

    /// Record without failing the caller; errors are logged
    pub fn record_clean_best_effort(&self, result: &CleanResult) {
        if let Err(e) = self.record_clean(result) {
            warn!(error = %e, kind = e.kind(), "Cleanup history not saved");
        }
    }

    pub fn clean_stats(&self) -> CleanStats {
        self.clean_stats_at(local_now())
    }

    pub fn clean_stats_at(&self, now: NaiveDateTime) -> CleanStats {
        rollup::clean_stats(self.clean.load(), now, &self.rollup)
    }

    // ---- memory ----

    pub fn record_optimize(&self, result: &MemoryOptResult) -> Result<()> {
        self.record_optimize_at(result, local_now())
    }

    pub fn record_optimize_at(&self, result: &MemoryOptResult, now: NaiveDateTime) -> Result<()> {
        self.memory.append(MemOptRecord::new(now, result), now)?;
        info!(
            freed_mb = result.freed_mb,
            before = result.before_percent,
            after = result.after_percent,
            "Memory optimization recorded"
        );
        Ok(())
    }

    pub fn record_optimize_best_effort(&self, result: &MemoryOptResult) {
        if let Err(e) = self.record_optimize(result) {
            warn!(error = %e, kind = e.kind(), "Memory optimization history not saved");
        }
    }

    pub fn memory_stats(&self) -> MemOptStats {
        self.memory_stats_at(local_now())
    }

    pub fn memory_stats_at(&self, now: NaiveDateTime) -> MemOptStats {
        rollup::memory_stats(self.memory.load(), now, &self.rollup)
    }

    // ---- network ----

    /// Persist an already computed traffic delta
    pub fn record_traffic_at(&self, sent: u64, recv: u64, now: NaiveDateTime) -> Result<AppendOutcome> {
        self.network.append(NetTrafficRecord::new(now, sent, recv), now)
    }

    /// Sampler writing into this history's network store
    pub fn network_sampler<C: CounterSource>(&self, source: C, interval: Duration) -> NetworkSampler<C> {
        NetworkSampler::new(Arc::clone(&self.network), source, interval)
    }

    pub fn network_stats(&self) -> NetTrafficStats {
        self.network_stats_at(local_now())
    }

    pub fn network_stats_at(&self, now: NaiveDateTime) -> NetTrafficStats {
        rollup::network_stats(&self.network.load(), now, &self.rollup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Locale;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn at(m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_settings_flow_into_stores() {
        let dir = tempdir().unwrap();
        let settings = HistorySettings {
            retention_days: 10,
            recent_records: 2,
            locale: Locale::Zh,
            ..Default::default()
        };
        let history = History::open(dir.path(), &settings);

        for d in 1..=5 {
            history
                .record_optimize_at(&MemoryOptResult::default(), at(3, d * 5, 9))
                .unwrap();
        }

        let stats = history.memory_stats_at(at(3, 25, 10));
        // Only 03-15 onwards survive a 10-day retention ending 03-25
        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.recent_records.len(), 2);
        assert_eq!(stats.last_opt_ago, "1小时前");
    }

    #[test]
    fn test_paths_live_in_data_dir() {
        let dir = tempdir().unwrap();
        let history = History::open(dir.path(), &HistorySettings::default());
        assert_eq!(history.data_dir(), dir.path());
        assert_eq!(history.clean_path(), dir.path().join("clean_history.json"));
        assert_eq!(history.memory_path(), dir.path().join("mem_opt_history.json"));
        assert_eq!(history.network_path(), dir.path().join("net_history.json"));
    }

    #[test]
    fn test_best_effort_swallows_write_failure() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let history = History::open(&blocker, &HistorySettings::default());
        assert!(history.record_clean(&CleanResult::default()).is_err());
        history.record_clean_best_effort(&CleanResult::default());
        history.record_optimize_best_effort(&MemoryOptResult::default());
        assert_eq!(history.clean_stats().total_count, 0);
    }
}
