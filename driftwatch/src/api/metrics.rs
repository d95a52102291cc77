//! チェック結果サマリーAPI

use super::error::AppError;
use crate::db::CheckSummary;
use crate::AppState;
use axum::{extract::State, Json};
use chrono::{Duration, Local, Utc};
use driftwatch_common::error::WatchError;
use serde::Serialize;

/// 集計期間
const SUMMARY_WINDOW_HOURS: i64 = 1;

/// メトリクスレスポンス
#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    /// 成功フラグ
    pub success: bool,
    /// 直近1時間のサマリー
    pub metrics: CheckSummary,
    /// 応答時刻
    pub timestamp: String,
}

/// GET /api/metrics
pub async fn get_metrics(State(state): State<AppState>) -> Result<Json<MetricsResponse>, AppError> {
    let store = state
        .store
        .as_ref()
        .ok_or_else(|| WatchError::StoreUnavailable("check store is not configured".into()))?;

    let metrics = store
        .summary_since(Utc::now() - Duration::hours(SUMMARY_WINDOW_HOURS))
        .await?;

    Ok(Json(MetricsResponse {
        success: true,
        metrics,
        timestamp: Local::now().to_rfc3339(),
    }))
}
