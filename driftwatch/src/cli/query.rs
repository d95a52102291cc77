//! query サブコマンド
//!
//! ログファイルを照会して標準出力へ書き出します。

use crate::config;
use crate::query::{self, ExportFormat, FilterSpec, LevelFilter, LogKind, LogQuery, QueryOutcome};
use clap::{Args, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;

/// 出力形式
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Raw log lines
    #[default]
    Text,
    /// JSON records
    Json,
    /// CSV with Timestamp,Level,Message columns
    Csv,
}

/// query サブコマンドの引数
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Log type (watchdog or metrics)
    #[arg(short = 't', long = "type", default_value = "watchdog")]
    pub log_type: String,

    /// Number of lines to return
    #[arg(short = 'n', long, default_value_t = 50)]
    pub lines: usize,

    /// Level filter (ALL, ERROR, WARNING, INFO, DEBUG)
    #[arg(short, long, default_value = "ALL")]
    pub level: String,

    /// Regular expression to search for
    #[arg(short, long)]
    pub search: Option<String>,

    /// Match the search pattern case-sensitively
    #[arg(long, default_value_t = false)]
    pub case_sensitive: bool,

    /// Start of the time range (inclusive)
    #[arg(long)]
    pub start: Option<String>,

    /// End of the time range (inclusive)
    #[arg(long)]
    pub end: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Print statistics after the lines
    #[arg(long, default_value_t = false)]
    pub stats: bool,

    /// Log directory (default: DRIFTWATCH_LOG_DIR)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl QueryArgs {
    /// クエリを組み立てる
    pub fn to_query(&self) -> Result<LogQuery, anyhow::Error> {
        Ok(LogQuery {
            kind: LogKind::parse(&self.log_type)?,
            lines: self.lines.max(1),
            filter: FilterSpec::new(LevelFilter::parse(&self.level))
                .with_time_bounds(self.start.as_deref(), self.end.as_deref())
                .with_search(self.search.as_deref(), self.case_sensitive),
            with_statistics: self.stats,
        })
    }
}

/// 結果を書き出す
pub fn write_outcome<W: Write>(
    mut out: W,
    outcome: &QueryOutcome,
    format: OutputFormat,
) -> Result<(), anyhow::Error> {
    match format {
        OutputFormat::Text => {
            for entry in &outcome.entries {
                writeln!(out, "{}", entry.parsed.raw)?;
            }
        }
        OutputFormat::Json => {
            out.write_all(&query::render(&outcome.entries, ExportFormat::Json)?)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            out.write_all(&query::render(&outcome.entries, ExportFormat::Csv)?)?;
        }
    }
    if let Some(stats) = &outcome.statistics {
        writeln!(out, "{}", serde_json::to_string_pretty(stats)?)?;
    }
    Ok(())
}

/// query コマンドを実行
pub fn execute(args: &QueryArgs) -> Result<(), anyhow::Error> {
    let query = args.to_query()?;
    for warning in &query.filter.warnings {
        warn!("{}", warning);
    }
    let log_dir = args.log_dir.clone().unwrap_or_else(config::log_dir);
    let outcome = query::run_query(&log_dir, &query)?;
    write_outcome(std::io::stdout().lock(), &outcome, args.format)
}
