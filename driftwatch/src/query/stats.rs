//! フィルタ後エントリの統計

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use std::collections::BTreeMap;

use super::filter::LogEntry;

const LEVEL_BUCKETS: [&str; 5] = ["ERROR", "WARNING", "INFO", "DEBUG", "UNKNOWN"];

/// ログ統計
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    /// 対象行数
    pub total_lines: usize,
    /// レベル別件数（レベルのない行・未知レベルは UNKNOWN）
    pub level_counts: BTreeMap<String, usize>,
    /// 最も古いタイムスタンプ
    pub first_timestamp: Option<NaiveDateTime>,
    /// 最も新しいタイムスタンプ
    pub last_timestamp: Option<NaiveDateTime>,
    /// 時間帯別件数（キーは `YYYY-MM-DD HH:00`）
    pub hourly_counts: BTreeMap<String, usize>,
}

/// 統計を計算する
pub fn compute(entries: &[LogEntry]) -> Statistics {
    let mut level_counts: BTreeMap<String, usize> = LEVEL_BUCKETS
        .iter()
        .map(|bucket| (bucket.to_string(), 0))
        .collect();
    let mut hourly_counts = BTreeMap::new();
    let mut first_timestamp: Option<NaiveDateTime> = None;
    let mut last_timestamp: Option<NaiveDateTime> = None;

    for entry in entries {
        let bucket = entry
            .parsed
            .level
            .as_ref()
            .map(|level| level.stats_bucket())
            .unwrap_or("UNKNOWN");
        *level_counts.entry(bucket.to_string()).or_default() += 1;

        if let Some(ts) = entry.parsed.timestamp {
            first_timestamp = Some(first_timestamp.map_or(ts, |first| first.min(ts)));
            last_timestamp = Some(last_timestamp.map_or(ts, |last| last.max(ts)));
            *hourly_counts.entry(hour_bucket(&ts)).or_default() += 1;
        }
    }

    Statistics {
        total_lines: entries.len(),
        level_counts,
        first_timestamp,
        last_timestamp,
        hourly_counts,
    }
}

fn hour_bucket(ts: &NaiveDateTime) -> String {
    format!("{} {:02}:00", ts.date().format("%Y-%m-%d"), ts.hour())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filter::annotate;
    use chrono::NaiveDate;
    use driftwatch_common::log::LogGrammar;

    #[test]
    fn counts_levels_and_hours() {
        let entries = annotate(
            [
                "2025-09-02 01:10:00,000 - watchdog - INFO - a",
                "2025-09-02 01:20:00,000 - watchdog - ERROR - b",
                "Traceback (most recent call last):",
                "2025-09-02 02:05:00,000 - watchdog - WARN - c",
                "2025-09-02 00:59:59,999 - watchdog - CRITICAL - d",
            ],
            LogGrammar::Application,
        );
        let stats = compute(&entries);

        assert_eq!(stats.total_lines, 5);
        assert_eq!(stats.level_counts["INFO"], 1);
        assert_eq!(stats.level_counts["ERROR"], 1);
        assert_eq!(stats.level_counts["WARNING"], 1);
        assert_eq!(stats.level_counts["DEBUG"], 0);
        // 継続行と未知レベル
        assert_eq!(stats.level_counts["UNKNOWN"], 2);

        assert_eq!(stats.hourly_counts["2025-09-02 00:00"], 1);
        assert_eq!(stats.hourly_counts["2025-09-02 01:00"], 2);
        assert_eq!(stats.hourly_counts["2025-09-02 02:00"], 1);

        let day = NaiveDate::from_ymd_opt(2025, 9, 2).unwrap();
        assert_eq!(
            stats.first_timestamp,
            day.and_hms_milli_opt(0, 59, 59, 999)
        );
        assert_eq!(stats.last_timestamp, day.and_hms_opt(2, 5, 0));
    }

    #[test]
    fn metric_lines_count_as_unknown() {
        let entries = annotate(
            [r#"2025-09-02 01:10:00,000 - {"metric": "cycle_duration_ms", "value": 12}"#],
            LogGrammar::Metric,
        );
        let stats = compute(&entries);
        assert_eq!(stats.level_counts["UNKNOWN"], 1);
        assert_eq!(stats.total_lines, 1);
    }

    #[test]
    fn empty_input() {
        let stats = compute(&[]);
        assert_eq!(stats.total_lines, 0);
        assert_eq!(stats.first_timestamp, None);
        assert!(stats.hourly_counts.is_empty());
        assert_eq!(stats.level_counts.len(), 5);
    }
}
