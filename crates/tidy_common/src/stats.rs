//! Read models handed to the presentation layer.
//!
//! Field names are part of the front-end contract; keep them snake_case and
//! stable. Every `Vec` is sorted ascending by its key.

use crate::record::{CleanRecord, MemOptRecord};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanStats {
    /// Every cleanup ever recorded, oldest first
    pub records: Vec<CleanRecord>,
    /// Trailing window, per day
    pub daily_stats: Vec<CleanDailyStat>,
    pub monthly_stats: Vec<CleanMonthlyStat>,
    /// `YYYY-MM-DD HH:MM:SS` of the last cleanup, empty if none
    pub last_clean_time: String,
    pub last_clean_ago: String,
    pub total_freed: i64,
    pub total_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanDailyStat {
    pub date: String,
    pub freed_size: i64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanMonthlyStat {
    /// `YYYY-MM`
    pub month: String,
    pub freed_size: i64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemOptStats {
    /// Tail of the history for the trend line, oldest first
    pub recent_records: Vec<MemOptRecord>,
    pub daily_stats: Vec<MemOptDailyStat>,
    pub monthly_stats: Vec<MemOptMonthlyStat>,
    pub last_opt_time: String,
    pub last_opt_ago: String,
    pub total_freed_mb: f64,
    /// Number of optimizations
    pub total_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemOptDailyStat {
    pub date: String,
    pub freed_mb: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemOptMonthlyStat {
    pub month: String,
    pub freed_mb: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetTrafficStats {
    pub daily_stats: Vec<NetDailyStat>,
    pub monthly_stats: Vec<NetMonthlyStat>,
    pub yearly_stats: Vec<NetYearlyStat>,
    pub total_sent: u64,
    pub total_recv: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetDailyStat {
    pub date: String,
    pub sent: u64,
    pub recv: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetMonthlyStat {
    pub month: String,
    pub sent: u64,
    pub recv: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetYearlyStat {
    /// `YYYY`
    pub year: String,
    pub sent: u64,
    pub recv: u64,
}
