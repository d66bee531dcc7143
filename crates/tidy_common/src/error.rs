//! Error types for the history engine.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data directory unavailable: {}", .0.display())]
    DataDir(PathBuf),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Counter read failed: {0}")]
    Counters(String),
}

impl HistoryError {
    /// Short machine-readable tag, used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            HistoryError::Io(_) => "io",
            HistoryError::Json(_) => "json",
            HistoryError::DataDir(_) => "data_dir",
            HistoryError::Config(_) => "config",
            HistoryError::Counters(_) => "counters",
        }
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;
