//! Tidy Common - history engine for the tidy desktop utility
//!
//! Durable history for cleanup runs, memory optimizations and network
//! traffic, plus the rollups the front end charts from it.

pub mod config;
pub mod datadir;
pub mod error;
pub mod history;
pub mod record;
pub mod rollup;
pub mod sampler;
pub mod stats;
pub mod store;

pub use config::{Locale, TidyConfig};
pub use error::{HistoryError, Result};
pub use history::History;
pub use record::{CleanRecord, CleanResult, MemOptRecord, MemoryOptResult, NetTrafficRecord};
pub use sampler::{CounterReading, CounterSource, NetworkSampler, SamplerState, SystemCounters};
pub use stats::{CleanStats, MemOptStats, NetTrafficStats};
pub use store::{AppendOutcome, RecordStore};
