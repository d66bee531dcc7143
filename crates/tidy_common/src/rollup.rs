//! Rollups over a record sequence.
//!
//! Everything here is a pure function of the records and "now". Grouping
//! works on string prefixes of the `YYYY-MM-DD` date: day = whole date,
//! month = first 7 chars, year = first 4. Groups come out ascending by key.

use crate::config::Locale;
use crate::record::{CleanRecord, MemOptRecord, NetTrafficRecord, DATE_FORMAT, DATETIME_FORMAT};
use crate::stats::{
    CleanDailyStat, CleanMonthlyStat, CleanStats, MemOptDailyStat, MemOptMonthlyStat,
    MemOptStats, NetDailyStat, NetMonthlyStat, NetTrafficStats, NetYearlyStat,
};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::warn;

const MONTH_KEY_LEN: usize = 7;
const YEAR_KEY_LEN: usize = 4;

/// Knobs shared by all three domains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollupOptions {
    pub daily_window_days: u32,
    pub recent_records: usize,
    pub locale: Locale,
}

impl Default for RollupOptions {
    fn default() -> Self {
        Self {
            daily_window_days: 30,
            recent_records: 10,
            locale: Locale::En,
        }
    }
}

/// Per-group accumulator
pub trait Tally: Default + Copy {
    fn absorb(&mut self, other: Self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct CleanTally {
    freed: i64,
    count: u64,
}

impl Tally for CleanTally {
    fn absorb(&mut self, other: Self) {
        self.freed = self.freed.saturating_add(other.freed);
        self.count = self.count.saturating_add(other.count);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct MemTally {
    freed_mb: f64,
    count: u64,
}

impl Tally for MemTally {
    fn absorb(&mut self, other: Self) {
        self.freed_mb += other.freed_mb;
        self.count = self.count.saturating_add(other.count);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct NetTally {
    sent: u64,
    recv: u64,
}

impl Tally for NetTally {
    fn absorb(&mut self, other: Self) {
        self.sent = self.sent.saturating_add(other.sent);
        self.recv = self.recv.saturating_add(other.recv);
    }
}

/// Group `records` by `key` and fold each group with `tally`
pub fn group_by<'a, R, T, K, F>(records: &'a [R], key: K, tally: F) -> Vec<(String, T)>
where
    T: Tally,
    K: Fn(&'a R) -> &'a str,
    F: Fn(&R) -> T,
{
    let mut groups: BTreeMap<&str, T> = BTreeMap::new();
    for record in records {
        groups.entry(key(record)).or_default().absorb(tally(record));
    }
    groups.into_iter().map(|(k, t)| (k.to_string(), t)).collect()
}

/// Leading `len` chars of a date, or the whole string if it is shorter
pub fn date_prefix(date: &str, len: usize) -> &str {
    date.get(..len).unwrap_or(date)
}

/// First date still inside a trailing window of `days` ending at `now`
pub fn window_start(now: NaiveDateTime, days: u32) -> String {
    (now.date() - Duration::days(i64::from(days)))
        .format(DATE_FORMAT)
        .to_string()
}

/// How "time since last event" is phrased
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecencyStyle {
    /// Largest unit only: "3 days ago"
    Compact,
    /// Past one day, days and hours: "3 days 4 hours ago"
    DaysHours,
}

/// Which "never happened" marker to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Cleanup,
    Optimization,
}

pub fn never_marker(kind: EventKind, locale: Locale) -> &'static str {
    match (kind, locale) {
        (EventKind::Cleanup, Locale::En) => "never cleaned",
        (EventKind::Cleanup, Locale::Zh) => "从未清理",
        (EventKind::Optimization, Locale::En) => "never optimized",
        (EventKind::Optimization, Locale::Zh) => "从未优化",
    }
}

fn en_unit(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// Bucket an elapsed duration into a relative-time phrase.
/// Negative durations (clock moved back) read as "just now".
pub fn format_elapsed(elapsed: Duration, style: RecencyStyle, locale: Locale) -> String {
    let minutes = elapsed.num_minutes().max(0);
    let hours = elapsed.num_hours().max(0);
    let days = elapsed.num_days().max(0);

    if minutes < 1 {
        return match locale {
            Locale::En => "just now".to_string(),
            Locale::Zh => "刚刚".to_string(),
        };
    }
    if hours < 1 {
        return match locale {
            Locale::En => format!("{} ago", en_unit(minutes, "minute")),
            Locale::Zh => format!("{}分钟前", minutes),
        };
    }
    if days < 1 {
        return match locale {
            Locale::En => format!("{} ago", en_unit(hours, "hour")),
            Locale::Zh => format!("{}小时前", hours),
        };
    }

    match (style, locale) {
        (RecencyStyle::Compact, Locale::En) => format!("{} ago", en_unit(days, "day")),
        (RecencyStyle::Compact, Locale::Zh) => format!("{}天前", days),
        (RecencyStyle::DaysHours, Locale::En) => format!(
            "{} {} ago",
            en_unit(days, "day"),
            en_unit(hours % 24, "hour")
        ),
        (RecencyStyle::DaysHours, Locale::Zh) => format!("{}天{}小时前", days, hours % 24),
    }
}

/// Last event time and its relative phrase. An unparseable timestamp
/// keeps the raw time but an empty phrase.
fn last_event(date: &str, time: &str, now: NaiveDateTime, style: RecencyStyle, locale: Locale) -> (String, String) {
    let stamp = format!("{} {}", date, time);
    match NaiveDateTime::parse_from_str(&stamp, DATETIME_FORMAT) {
        Ok(then) => {
            let ago = format_elapsed(now - then, style, locale);
            (stamp, ago)
        }
        Err(e) => {
            warn!(timestamp = %stamp, error = %e, "Unparseable last event time");
            (stamp, String::new())
        }
    }
}

pub fn clean_stats(records: Vec<CleanRecord>, now: NaiveDateTime, opts: &RollupOptions) -> CleanStats {
    let mut stats = CleanStats::default();

    let Some(last) = records.last() else {
        stats.last_clean_ago = never_marker(EventKind::Cleanup, opts.locale).to_string();
        return stats;
    };
    let (time, ago) = last_event(&last.date, &last.time, now, RecencyStyle::DaysHours, opts.locale);
    stats.last_clean_time = time;
    stats.last_clean_ago = ago;

    let tally = |r: &CleanRecord| CleanTally {
        freed: r.freed_size,
        count: r.cleaned_count,
    };

    let mut total = CleanTally::default();
    for r in &records {
        total.absorb(tally(r));
    }
    stats.total_freed = total.freed;
    stats.total_count = total.count;

    let cutoff = window_start(now, opts.daily_window_days);
    let recent: Vec<&CleanRecord> = records.iter().filter(|r| r.date >= cutoff).collect();
    stats.daily_stats = group_by(&recent, |r| r.date.as_str(), |r| tally(*r))
        .into_iter()
        .map(|(date, t)| CleanDailyStat {
            date,
            freed_size: t.freed,
            count: t.count,
        })
        .collect();

    stats.monthly_stats = group_by(&records, |r| date_prefix(&r.date, MONTH_KEY_LEN), tally)
        .into_iter()
        .map(|(month, t)| CleanMonthlyStat {
            month,
            freed_size: t.freed,
            count: t.count,
        })
        .collect();

    stats.records = records;
    stats
}

pub fn memory_stats(records: Vec<MemOptRecord>, now: NaiveDateTime, opts: &RollupOptions) -> MemOptStats {
    let mut stats = MemOptStats::default();

    let Some(last) = records.last() else {
        stats.last_opt_ago = never_marker(EventKind::Optimization, opts.locale).to_string();
        return stats;
    };
    let (time, ago) = last_event(&last.date, &last.time, now, RecencyStyle::Compact, opts.locale);
    stats.last_opt_time = time;
    stats.last_opt_ago = ago;

    let tally = |r: &MemOptRecord| MemTally {
        freed_mb: r.freed_mb,
        count: 1,
    };

    let mut total = MemTally::default();
    for r in &records {
        total.absorb(tally(r));
    }
    stats.total_freed_mb = total.freed_mb;
    stats.total_count = total.count;

    let cutoff = window_start(now, opts.daily_window_days);
    let recent: Vec<&MemOptRecord> = records.iter().filter(|r| r.date >= cutoff).collect();
    stats.daily_stats = group_by(&recent, |r| r.date.as_str(), |r| tally(*r))
        .into_iter()
        .map(|(date, t)| MemOptDailyStat {
            date,
            freed_mb: t.freed_mb,
            count: t.count,
        })
        .collect();

    stats.monthly_stats = group_by(&records, |r| date_prefix(&r.date, MONTH_KEY_LEN), tally)
        .into_iter()
        .map(|(month, t)| MemOptMonthlyStat {
            month,
            freed_mb: t.freed_mb,
            count: t.count,
        })
        .collect();

    let start = records.len().saturating_sub(opts.recent_records);
    stats.recent_records = records[start..].to_vec();
    stats
}

pub fn network_stats(records: &[NetTrafficRecord], now: NaiveDateTime, opts: &RollupOptions) -> NetTrafficStats {
    let mut stats = NetTrafficStats::default();

    let tally = |r: &NetTrafficRecord| NetTally {
        sent: r.sent,
        recv: r.recv,
    };

    let mut total = NetTally::default();
    for r in records {
        total.absorb(tally(r));
    }
    stats.total_sent = total.sent;
    stats.total_recv = total.recv;

    let cutoff = window_start(now, opts.daily_window_days);
    let recent: Vec<&NetTrafficRecord> = records.iter().filter(|r| r.date >= cutoff).collect();
    stats.daily_stats = group_by(&recent, |r| r.date.as_str(), |r| tally(*r))
        .into_iter()
        .map(|(date, t)| NetDailyStat {
            date,
            sent: t.sent,
            recv: t.recv,
        })
        .collect();

    stats.monthly_stats = group_by(records, |r| date_prefix(&r.date, MONTH_KEY_LEN), tally)
        .into_iter()
        .map(|(month, t)| NetMonthlyStat {
            month,
            sent: t.sent,
            recv: t.recv,
        })
        .collect();

    stats.yearly_stats = group_by(records, |r| date_prefix(&r.date, YEAR_KEY_LEN), tally)
        .into_iter()
        .map(|(year, t)| NetYearlyStat {
            year,
            sent: t.sent,
            recv: t.recv,
        })
        .collect();

    stats
}
