//! History records for the three domains.
//!
//! Dates are always `YYYY-MM-DD` so that month (`YYYY-MM`) and year (`YYYY`)
//! keys are plain prefixes, and lexical order equals chronological order.
//! Network timestamps are `YYYY-MM-DD HH:MM`, with the date as prefix.

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How long a domain keeps its records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Kept forever, for lifetime totals
    Unbounded,
    /// Records dated before `now - days` are dropped on every append
    TrailingDays(u32),
}

/// A record persisted by [`crate::store::RecordStore`]
pub trait HistoryRecord: Serialize + DeserializeOwned + Clone + Send + 'static {
    /// Backing file name inside the data directory
    const FILE_NAME: &'static str;

    /// Retention used when none is configured
    const DEFAULT_RETENTION: Retention;

    /// `YYYY-MM-DD`
    fn date(&self) -> &str;

    /// Fold `self` into the previous record if both share a time bucket.
    /// Returns `true` when merged, in which case `self` must not be appended.
    fn merge_into(&self, _last: &mut Self) -> bool {
        false
    }
}

/// Result reported by the junk cleaner
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanResult {
    pub freed_size: i64,
    pub cleaned_count: u64,
    pub failed_count: u64,
}

/// Result reported by the working-set trimmer
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryOptResult {
    pub before_used: u64,
    pub after_used: u64,
    pub freed_mb: f64,
    pub before_percent: f64,
    pub after_percent: f64,
}

/// One cleanup run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanRecord {
    pub date: String,
    pub time: String,
    /// Bytes freed
    pub freed_size: i64,
    /// Files removed
    pub cleaned_count: u64,
}

impl CleanRecord {
    pub fn new(at: NaiveDateTime, result: &CleanResult) -> Self {
        Self {
            date: at.format(DATE_FORMAT).to_string(),
            time: at.format(TIME_FORMAT).to_string(),
            freed_size: result.freed_size,
            cleaned_count: result.cleaned_count,
        }
    }
}

impl HistoryRecord for CleanRecord {
    const FILE_NAME: &'static str = "clean_history.json";
    const DEFAULT_RETENTION: Retention = Retention::Unbounded;

    fn date(&self) -> &str {
        &self.date
    }
}

/// One memory optimization run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemOptRecord {
    pub date: String,
    pub time: String,
    pub freed_mb: f64,
    pub before_percent: f64,
    pub after_percent: f64,
}

impl MemOptRecord {
    pub fn new(at: NaiveDateTime, result: &MemoryOptResult) -> Self {
        Self {
            date: at.format(DATE_FORMAT).to_string(),
            time: at.format(TIME_FORMAT).to_string(),
            freed_mb: result.freed_mb,
            before_percent: result.before_percent,
            after_percent: result.after_percent,
        }
    }
}

impl HistoryRecord for MemOptRecord {
    const FILE_NAME: &'static str = "mem_opt_history.json";
    const DEFAULT_RETENTION: Retention = Retention::TrailingDays(90);

    fn date(&self) -> &str {
        &self.date
    }
}

/// Traffic seen during one or more sampling intervals within a minute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetTrafficRecord {
    /// `YYYY-MM-DD HH:MM`
    pub timestamp: String,
    pub date: String,
    pub sent: u64,
    pub recv: u64,
}

impl NetTrafficRecord {
    pub fn new(at: NaiveDateTime, sent: u64, recv: u64) -> Self {
        Self {
            timestamp: at.format(MINUTE_FORMAT).to_string(),
            date: at.format(DATE_FORMAT).to_string(),
            sent,
            recv,
        }
    }
}

impl HistoryRecord for NetTrafficRecord {
    const FILE_NAME: &'static str = "net_history.json";
    const DEFAULT_RETENTION: Retention = Retention::TrailingDays(90);

    fn date(&self) -> &str {
        &self.date
    }

    fn merge_into(&self, last: &mut Self) -> bool {
        if last.timestamp != self.timestamp {
            return false;
        }
        last.sent = last.sent.saturating_add(self.sent);
        last.recv = last.recv.saturating_add(self.recv);
        true
    }
}

/// On-disk document: `{"records": [...]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "R: Deserialize<'de>"))]
pub struct HistoryFile<R> {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub records: Vec<R>,
}

impl<R> Default for HistoryFile<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

// Older writers emitted `"records": null` for an empty history
fn null_as_empty<'de, D, R>(deserializer: D) -> Result<Vec<R>, D::Error>
where
    D: Deserializer<'de>,
    R: Deserialize<'de>,
{
    Ok(Option::<Vec<R>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_record_formats() {
        let clean = CleanRecord::new(
            at(7, 5, 3),
            &CleanResult {
                freed_size: 2048,
                cleaned_count: 3,
                failed_count: 1,
            },
        );
        assert_eq!(clean.date, "2024-03-09");
        assert_eq!(clean.time, "07:05:03");

        let net = NetTrafficRecord::new(at(23, 59, 59), 1, 2);
        assert_eq!(net.timestamp, "2024-03-09 23:59");
        assert!(net.timestamp.starts_with(&net.date));
    }

    #[test]
    fn test_net_merge_same_minute_only() {
        let mut last = NetTrafficRecord::new(at(10, 0, 1), 100, 10);
        let same = NetTrafficRecord::new(at(10, 0, 59), 5, 7);
        let next = NetTrafficRecord::new(at(10, 1, 0), 1, 1);

        assert!(same.merge_into(&mut last));
        assert_eq!((last.sent, last.recv), (105, 17));
        assert!(!next.merge_into(&mut last));
        assert_eq!((last.sent, last.recv), (105, 17));
    }

    #[test]
    fn test_event_records_never_merge() {
        let mut last = MemOptRecord::new(at(1, 0, 0), &MemoryOptResult::default());
        let same = last.clone();
        assert!(!same.merge_into(&mut last));
    }

    #[test]
    fn test_null_records_parse_as_empty() {
        let file: HistoryFile<CleanRecord> = serde_json::from_str(r#"{"records": null}"#).unwrap();
        assert!(file.records.is_empty());

        let file: HistoryFile<CleanRecord> = serde_json::from_str("{}").unwrap();
        assert!(file.records.is_empty());
    }

    #[test]
    fn test_field_names_on_disk() {
        let net = NetTrafficRecord::new(at(10, 0, 0), 1, 2);
        let json = serde_json::to_value(&net).unwrap();
        for key in ["timestamp", "date", "sent", "recv"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
