//! Terminal rendering of the history read models. ASCII only.

use owo_colors::OwoColorize;
use tidy_common::{CleanStats, MemOptStats, NetTrafficStats};

const SEPARATOR: &str = "------------------------------------------------------------";

/// Human-readable byte count, binary units
pub fn format_bytes(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let sign = if bytes < 0 { "-" } else { "" };
    let mut value = bytes.unsigned_abs() as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}{} {}", sign, value, UNITS[0])
    } else {
        format!("{}{:.1} {}", sign, value, UNITS[unit])
    }
}

fn format_unsigned(bytes: u64) -> String {
    format_bytes(i64::try_from(bytes).unwrap_or(i64::MAX))
}

pub fn success(message: &str) {
    println!("[OK] {}", message.bright_green());
}

pub fn field(label: &str, value: &str) {
    println!("  {:<12} {}", format!("{}:", label).dimmed(), value);
}

fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", SEPARATOR.dimmed());
}

fn section(title: &str) {
    println!();
    println!("[{}]", title.cyan());
}

pub fn clean_stats(stats: &CleanStats) {
    header("Cleanup history");
    field("total freed", &format_bytes(stats.total_freed));
    field("files", &stats.total_count.to_string());
    if stats.last_clean_time.is_empty() {
        field("last", &stats.last_clean_ago);
    } else {
        field(
            "last",
            &format!("{} ({})", stats.last_clean_time, stats.last_clean_ago),
        );
    }

    if !stats.daily_stats.is_empty() {
        section("daily");
        for day in &stats.daily_stats {
            println!("  {}  {:>10}  {:>6} files", day.date, format_bytes(day.freed_size), day.count);
        }
    }
    if !stats.monthly_stats.is_empty() {
        section("monthly");
        for month in &stats.monthly_stats {
            println!(
                "  {}     {:>10}  {:>6} files",
                month.month,
                format_bytes(month.freed_size),
                month.count
            );
        }
    }
    println!();
}

pub fn memory_stats(stats: &MemOptStats) {
    header("Memory optimization history");
    field("total freed", &format!("{:.1} MB", stats.total_freed_mb));
    field("runs", &stats.total_count.to_string());
    if stats.last_opt_time.is_empty() {
        field("last", &stats.last_opt_ago);
    } else {
        field("last", &format!("{} ({})", stats.last_opt_time, stats.last_opt_ago));
    }

    if !stats.daily_stats.is_empty() {
        section("daily");
        for day in &stats.daily_stats {
            println!("  {}  {:>10.1} MB  {:>4} runs", day.date, day.freed_mb, day.count);
        }
    }
    if !stats.monthly_stats.is_empty() {
        section("monthly");
        for month in &stats.monthly_stats {
            println!("  {}     {:>10.1} MB  {:>4} runs", month.month, month.freed_mb, month.count);
        }
    }
    if !stats.recent_records.is_empty() {
        section("recent");
        for r in &stats.recent_records {
            println!(
                "  {} {}  {:>8.1} MB  {:>5.1}% -> {:>5.1}%",
                r.date, r.time, r.freed_mb, r.before_percent, r.after_percent
            );
        }
    }
    println!();
}

pub fn network_stats(stats: &NetTrafficStats) {
    header("Network traffic history");
    field("sent", &format_unsigned(stats.total_sent));
    field("received", &format_unsigned(stats.total_recv));

    let rows = [
        ("daily", stats.daily_stats.iter().map(|d| (d.date.as_str(), d.sent, d.recv)).collect::<Vec<_>>()),
        ("monthly", stats.monthly_stats.iter().map(|m| (m.month.as_str(), m.sent, m.recv)).collect()),
        ("yearly", stats.yearly_stats.iter().map(|y| (y.year.as_str(), y.sent, y.recv)).collect()),
    ];
    for (title, entries) in rows {
        if entries.is_empty() {
            continue;
        }
        section(title);
        for (key, sent, recv) in entries {
            println!(
                "  {:<10}  up {:>10}  down {:>10}",
                key,
                format_unsigned(sent),
                format_unsigned(recv)
            );
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.0 GB");
        assert_eq!(format_bytes(-2048), "-2.0 KB");
    }

    #[test]
    fn test_format_unsigned_saturates() {
        assert!(format_unsigned(u64::MAX).ends_with("TB"));
    }
}
