//! Tidy configuration.
//!
//! Lives in `$TIDY_CONFIG` or `<config_dir>/tidy/config.toml`. Every field
//! has a default, so a missing file or a partial file both work.
//!
//! ```toml
//! [history]
//! retention_days = 90
//! locale = "en"
//!
//! [sampler]
//! interval_secs = 30
//!
//! [log]
//! level = "info"
//! ```

use crate::error::{HistoryError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "TIDY_CONFIG";
const CONFIG_DIR_NAME: &str = "tidy";
const CONFIG_FILE: &str = "config.toml";

/// Language used for relative-time strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Zh => "zh",
        }
    }
}

/// History storage and rollup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    /// Override for the per-user data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Days kept for memory and network history (valid: 1-3650)
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Trailing days covered by the daily rollup (valid: 1-365)
    #[serde(default = "default_daily_window_days")]
    pub daily_window_days: u32,

    /// Raw records exposed for the memory trend line (valid: 1-100)
    #[serde(default = "default_recent_records")]
    pub recent_records: usize,

    #[serde(default)]
    pub locale: Locale,
}

fn default_retention_days() -> u32 {
    90
}

fn default_daily_window_days() -> u32 {
    30
}

fn default_recent_records() -> usize {
    10
}

impl HistorySettings {
    pub fn effective_retention_days(&self) -> u32 {
        self.retention_days.clamp(1, 3650)
    }

    pub fn effective_daily_window_days(&self) -> u32 {
        self.daily_window_days.clamp(1, 365)
    }

    pub fn effective_recent_records(&self) -> usize {
        self.recent_records.clamp(1, 100)
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            retention_days: default_retention_days(),
            daily_window_days: default_daily_window_days(),
            recent_records: default_recent_records(),
            locale: Locale::default(),
        }
    }
}

/// Network sampler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerSettings {
    #[serde(default = "default_sampler_enabled")]
    pub enabled: bool,

    /// Seconds between counter reads (valid: 5-300)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_sampler_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    30
}

impl SamplerSettings {
    pub fn effective_interval_secs(&self) -> u64 {
        self.interval_secs.clamp(5, 300)
    }

    pub fn interval_was_clamped(&self) -> bool {
        self.interval_secs != self.effective_interval_secs()
    }
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            enabled: default_sampler_enabled(),
            interval_secs: default_interval_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Complete tidy configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TidyConfig {
    #[serde(default)]
    pub history: HistorySettings,

    #[serde(default)]
    pub sampler: SamplerSettings,

    #[serde(default)]
    pub log: LogConfig,
}

impl TidyConfig {
    /// Load from the default location, falling back to defaults on any problem
    pub fn load() -> Self {
        match config_path() {
            Some(path) => Self::load_or_default(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`; a missing file yields defaults, a broken one is logged
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                Self::default()
            }
        }
    }

    /// Strict load, errors are returned
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| HistoryError::Config(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| HistoryError::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Config file path: `$TIDY_CONFIG`, else `<config_dir>/tidy/config.toml`
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE))
}
