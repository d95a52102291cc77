//! Log query engine
//!
//! watchdogが書き出したログファイルの末尾を読み、フィルタ・整形・統計を行う。
//! ファイルは追記のみで、クエリ毎に読み直すため状態は持たない。

/// JSON/CSVエクスポート
pub mod export;
/// フィルタ
pub mod filter;
/// 表示用整形
pub mod format;
/// 統計
pub mod stats;
/// 末尾読み取り
pub mod tail;

pub use export::{render, ExportFormat};
pub use filter::{FilterSpec, LevelFilter, LogEntry};
pub use stats::Statistics;

use driftwatch_common::error::{WatchError, WatchResult};
use driftwatch_common::log::{LogGrammar, LogLevel};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 末尾読み取りの倍率（要求行数に対して）
///
/// フィルタで件数が不足し、ファイルにまだ先がある場合のみ次の倍率で読み直す。
pub const TAIL_FACTORS: [usize; 2] = [2, 5];

/// `/api/log_levels` で走査する行数
pub const LEVEL_SAMPLE_LINES: usize = 500;

/// ログ種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// アプリケーションログ（watchdog.log）
    Watchdog,
    /// メトリクスログ（metrics.log）
    Metrics,
}

impl LogKind {
    /// 全種別
    pub const ALL: [LogKind; 2] = [LogKind::Watchdog, LogKind::Metrics];

    /// 種別名から解釈する
    pub fn parse(name: &str) -> WatchResult<Self> {
        match name {
            "watchdog" => Ok(LogKind::Watchdog),
            "metrics" => Ok(LogKind::Metrics),
            other => Err(WatchError::UnknownLogType(other.to_string())),
        }
    }

    /// 種別名
    pub fn as_str(&self) -> &'static str {
        match self {
            LogKind::Watchdog => "watchdog",
            LogKind::Metrics => "metrics",
        }
    }

    /// ファイル名
    pub fn file_name(&self) -> &'static str {
        match self {
            LogKind::Watchdog => "watchdog.log",
            LogKind::Metrics => "metrics.log",
        }
    }

    /// 行文法
    pub fn grammar(&self) -> LogGrammar {
        match self {
            LogKind::Watchdog => LogGrammar::Application,
            LogKind::Metrics => LogGrammar::Metric,
        }
    }

    /// ログディレクトリ内のパス
    pub fn path_in(&self, log_dir: &Path) -> PathBuf {
        log_dir.join(self.file_name())
    }

    /// 利用可能な種別名の一覧
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(LogKind::as_str).collect()
    }
}

/// クエリ要求
#[derive(Debug, Clone)]
pub struct LogQuery {
    /// ログ種別
    pub kind: LogKind,
    /// 返す最大行数
    pub lines: usize,
    /// フィルタ条件
    pub filter: FilterSpec,
    /// 統計を計算するか
    pub with_statistics: bool,
}

/// クエリ結果
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// 条件を満たした末尾 `lines` 件（古い順）
    pub entries: Vec<LogEntry>,
    /// 表示用に整形した行（`entries` と同順）
    pub formatted: Vec<String>,
    /// 切り詰め前の一致件数
    pub matched: usize,
    /// 読み取った行数
    pub scanned: usize,
    /// 一致した全エントリの統計
    pub statistics: Option<Statistics>,
}

/// ログクエリを実行する（ブロッキングI/O）
pub fn run_query(log_dir: &Path, query: &LogQuery) -> WatchResult<QueryOutcome> {
    let path = query.kind.path_in(log_dir);
    let grammar = query.kind.grammar();

    let mut attempt = 0;
    let (mut matched, scanned) = loop {
        let factor = TAIL_FACTORS[attempt];
        let window = tail::read_tail(&path, query.lines.saturating_mul(factor))?;
        let scanned = window.lines.len();
        let matched = query.filter.apply(filter::annotate(&window.lines, grammar));

        let exhausted = window.reached_start || attempt + 1 == TAIL_FACTORS.len();
        if matched.len() >= query.lines || exhausted {
            break (matched, scanned);
        }
        debug!(
            kind = query.kind.as_str(),
            matched = matched.len(),
            wanted = query.lines,
            "Filtered window too small, re-reading a larger tail"
        );
        attempt += 1;
    };

    let statistics = query.with_statistics.then(|| stats::compute(&matched));
    let total = matched.len();
    let entries = matched.split_off(total.saturating_sub(query.lines));
    let formatted = entries
        .iter()
        .map(|entry| format::format_line(&entry.parsed))
        .collect();

    Ok(QueryOutcome {
        entries,
        formatted,
        matched: total,
        scanned,
        statistics,
    })
}

/// 出現レベルの一覧
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSummary {
    /// `ALL` を先頭に、重要度順のレベル名
    pub available_levels: Vec<String>,
    /// レベル別件数
    pub level_counts: BTreeMap<String, usize>,
}

/// 末尾の行に出現するレベルを集計する
///
/// 各行自身のレベルのみを数える（継続行の引き継ぎはしない）。
pub fn available_levels(log_dir: &Path, kind: LogKind) -> WatchResult<LevelSummary> {
    let window = tail::read_tail(&kind.path_in(log_dir), LEVEL_SAMPLE_LINES)?;
    let mut counts: BTreeMap<LogLevel, usize> = BTreeMap::new();
    for entry in filter::annotate(&window.lines, kind.grammar()) {
        if let Some(level) = entry.parsed.level {
            *counts.entry(level).or_default() += 1;
        }
    }

    let mut available_levels = vec!["ALL".to_string()];
    available_levels.extend(counts.keys().map(|level| level.as_str().to_string()));
    let level_counts = counts
        .into_iter()
        .map(|(level, count)| (level.as_str().to_string(), count))
        .collect();

    Ok(LevelSummary {
        available_levels,
        level_counts,
    })
}
