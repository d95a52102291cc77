//! ログ閲覧API
//!
//! `/api/logs`、`/api/logs/export`、`/api/log_levels` エンドポイントを提供する。

use super::error::AppError;
use crate::query::{
    self, ExportFormat, FilterSpec, LevelFilter, LogKind, LogQuery, QueryOutcome, Statistics,
};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use driftwatch_common::error::{WatchError, WatchResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::task;

const DEFAULT_LINES: usize = 50;
const MAX_LINES: usize = 1000;

/// ログ取得クエリパラメーター
#[derive(Debug, Clone, Deserialize)]
pub struct LogsParams {
    /// ログ種別（watchdog / metrics）
    #[serde(rename = "type", default = "default_type")]
    pub log_type: String,
    /// 取得行数（1-1000）
    #[serde(default = "default_lines")]
    pub lines: usize,
    /// レベル（ALL / ERROR / WARNING / INFO / DEBUG）
    #[serde(default)]
    pub level: Option<String>,
    /// 検索パターン（正規表現）
    #[serde(default)]
    pub search: Option<String>,
    /// 大文字小文字を区別するか
    #[serde(default)]
    pub case_sensitive: bool,
    /// 開始時刻
    #[serde(default)]
    pub start: Option<String>,
    /// 終了時刻
    #[serde(default)]
    pub end: Option<String>,
    /// 統計を含めるか
    #[serde(default)]
    pub stats: bool,
    /// エクスポート形式（json / csv）
    #[serde(default)]
    pub format: Option<String>,
}

fn default_type() -> String {
    LogKind::Watchdog.as_str().to_string()
}

fn default_lines() -> usize {
    DEFAULT_LINES
}

fn clamp_lines(lines: usize) -> usize {
    lines.clamp(1, MAX_LINES)
}

impl LogsParams {
    fn to_query(&self) -> WatchResult<LogQuery> {
        let kind = LogKind::parse(&self.log_type)?;
        let filter = FilterSpec::new(LevelFilter::parse(self.level.as_deref().unwrap_or("ALL")))
            .with_time_bounds(self.start.as_deref(), self.end.as_deref())
            .with_search(self.search.as_deref(), self.case_sensitive);
        Ok(LogQuery {
            kind,
            lines: clamp_lines(self.lines),
            filter,
            with_statistics: self.stats,
        })
    }
}

/// ログレスポンス
#[derive(Debug, Clone, Serialize)]
pub struct LogsResponse {
    /// 成功フラグ
    pub success: bool,
    /// ログ種別
    #[serde(rename = "type")]
    pub log_type: String,
    /// 適用したレベル
    pub level_filter: String,
    /// 表示用に整形した行
    pub lines: Vec<String>,
    /// 切り詰め前の一致件数
    pub total_lines: usize,
    /// 返却件数
    pub count: usize,
    /// 読み取った行数
    pub scanned: usize,
    /// 統計
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
    /// 入力の警告（不正な正規表現・時刻）
    pub warnings: Vec<String>,
    /// 応答時刻
    pub timestamp: String,
}

async fn execute(log_dir: PathBuf, query: LogQuery) -> WatchResult<QueryOutcome> {
    task::spawn_blocking(move || query::run_query(&log_dir, &query))
        .await
        .map_err(|err| WatchError::Internal(format!("Failed to join log reader: {err}")))?
}

/// GET /api/logs
pub async fn get_logs(
    State(state): State<AppState>,
    Query(params): Query<LogsParams>,
) -> Result<Json<LogsResponse>, AppError> {
    let query = params.to_query()?;
    let log_type = query.kind.as_str().to_string();
    let level_filter = query.filter.level.as_str().to_string();
    let warnings = query.filter.warnings.clone();

    let outcome = execute(state.log_dir.clone(), query).await?;

    Ok(Json(LogsResponse {
        success: true,
        log_type,
        level_filter,
        count: outcome.formatted.len(),
        lines: outcome.formatted,
        total_lines: outcome.matched,
        scanned: outcome.scanned,
        statistics: outcome.statistics,
        warnings,
        timestamp: Local::now().to_rfc3339(),
    }))
}

/// GET /api/logs/export
pub async fn export_logs(
    State(state): State<AppState>,
    Query(params): Query<LogsParams>,
) -> Result<Response, AppError> {
    let format = match params.format.as_deref() {
        Some(name) => ExportFormat::parse(name)?,
        None => ExportFormat::default(),
    };
    let query = params.to_query()?;
    let kind = query.kind;

    let outcome = execute(state.log_dir.clone(), query).await?;
    let body = query::render(&outcome.entries, format)?;

    let filename = format!(
        "{}_logs_{}.{}",
        kind.as_str(),
        Local::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

/// レベル一覧クエリパラメーター
#[derive(Debug, Clone, Deserialize)]
pub struct LevelsParams {
    /// ログ種別
    #[serde(rename = "type", default = "default_type")]
    pub log_type: String,
}

/// レベル一覧レスポンス
#[derive(Debug, Clone, Serialize)]
pub struct LevelsResponse {
    /// 成功フラグ
    pub success: bool,
    /// ログ種別
    #[serde(rename = "type")]
    pub log_type: String,
    /// `ALL` と出現レベル（重要度順）
    pub available_levels: Vec<String>,
    /// レベル別件数
    pub level_counts: BTreeMap<String, usize>,
    /// 応答時刻
    pub timestamp: String,
}

/// GET /api/log_levels
pub async fn get_log_levels(
    State(state): State<AppState>,
    Query(params): Query<LevelsParams>,
) -> Result<Json<LevelsResponse>, AppError> {
    let kind = LogKind::parse(&params.log_type)?;
    let log_dir = state.log_dir.clone();
    let summary = task::spawn_blocking(move || query::available_levels(&log_dir, kind))
        .await
        .map_err(|err| WatchError::Internal(format!("Failed to join log reader: {err}")))??;

    Ok(Json(LevelsResponse {
        success: true,
        log_type: kind.as_str().to_string(),
        available_levels: summary.available_levels,
        level_counts: summary.level_counts,
        timestamp: Local::now().to_rfc3339(),
    }))
}
