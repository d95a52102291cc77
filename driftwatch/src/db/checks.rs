//! チェック結果のストレージ層（SQLite版）

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use driftwatch_common::error::{WatchError, WatchResult};
use driftwatch_common::types::{CheckResult, Provenance, Verdict};
use serde::Serialize;
use sqlx::SqlitePool;

use super::traits::CheckStore;

/// 永続化済みチェック結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredCheck {
    /// 行ID
    pub id: i64,
    /// チェック結果
    #[serde(flatten)]
    pub result: CheckResult,
}

/// 期間内チェックの集計
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct CheckSummary {
    /// 可用性（PASS割合 %、小数1桁）
    pub availability: f64,
    /// 平均応答時間（ミリ秒、整数に丸め）
    pub avg_response_time: f64,
    /// エラー率（FAIL割合 %、小数1桁）
    pub error_rate: f64,
    /// チェック総数
    pub total_checks: i64,
}

/// SQLiteチェックストア
#[derive(Clone)]
pub struct SqliteCheckStore {
    pool: SqlitePool,
}

impl SqliteCheckStore {
    /// 新しいストアを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn db_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(sqlx::FromRow)]
struct CheckRow {
    id: i64,
    container_id: String,
    target: String,
    status: String,
    http_status: i64,
    body_contains_expected: bool,
    drift_seconds: i64,
    max_allowed_drift: i64,
    response_time_ms: i64,
    fetched_time: String,
    time_provenance: String,
    local_time: String,
    created_at: String,
}

impl TryFrom<CheckRow> for StoredCheck {
    type Error = WatchError;

    fn try_from(row: CheckRow) -> Result<Self, Self::Error> {
        let parse = |value: &str, column: &str| {
            DateTime::parse_from_rfc3339(value).map_err(|e| {
                WatchError::StoreUnavailable(format!("Invalid {} '{}': {}", column, value, e))
            })
        };

        let verdict = match row.status.as_str() {
            "PASS" => Verdict::Pass,
            "FAIL" => Verdict::Fail,
            other => {
                return Err(WatchError::StoreUnavailable(format!(
                    "Invalid status: {}",
                    other
                )))
            }
        };
        let time_provenance = match row.time_provenance.as_str() {
            "external" => Provenance::External,
            "fallback" => Provenance::Fallback,
            other => {
                return Err(WatchError::StoreUnavailable(format!(
                    "Invalid provenance: {}",
                    other
                )))
            }
        };

        Ok(StoredCheck {
            id: row.id,
            result: CheckResult {
                target: row.target,
                container_id: row.container_id,
                verdict,
                http_status: row.http_status as u16,
                body_contains_expected: row.body_contains_expected,
                drift_seconds: row.drift_seconds,
                response_time_ms: row.response_time_ms as u64,
                fetched_time: parse(&row.fetched_time, "fetched_time")?,
                time_provenance,
                local_time: parse(&row.local_time, "local_time")?,
                created_at: parse(&row.created_at, "created_at")?.with_timezone(&Utc),
                max_allowed_drift: row.max_allowed_drift,
            },
        })
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    availability: Option<f64>,
    avg_response_time: Option<f64>,
    error_rate: Option<f64>,
    total_checks: i64,
}

#[async_trait]
impl CheckStore for SqliteCheckStore {
    async fn insert(&self, result: &CheckResult) -> WatchResult<i64> {
        let outcome = sqlx::query(
            r#"
            INSERT INTO checks (
                container_id, target, status, http_status, body_contains_expected,
                drift_seconds, max_allowed_drift, response_time_ms,
                fetched_time, time_provenance, local_time, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&result.container_id)
        .bind(&result.target)
        .bind(result.verdict.as_str())
        .bind(result.http_status as i64)
        .bind(result.body_contains_expected)
        .bind(result.drift_seconds)
        .bind(result.max_allowed_drift)
        .bind(result.response_time_ms as i64)
        .bind(result.fetched_time.to_rfc3339())
        .bind(result.time_provenance.as_str())
        .bind(result.local_time.to_rfc3339())
        .bind(db_timestamp(&result.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| WatchError::StoreUnavailable(format!("Failed to insert check: {}", e)))?;

        Ok(outcome.last_insert_rowid())
    }

    async fn recent(&self, limit: usize) -> WatchResult<Vec<StoredCheck>> {
        let rows = sqlx::query_as::<_, CheckRow>(
            "SELECT * FROM checks ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| WatchError::StoreUnavailable(format!("Failed to load checks: {}", e)))?;

        rows.into_iter().map(StoredCheck::try_from).collect()
    }

    async fn summary_since(&self, since: DateTime<Utc>) -> WatchResult<CheckSummary> {
        let row = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT
                ROUND(AVG(CASE WHEN status = 'PASS' THEN 100.0 ELSE 0.0 END), 1) as availability,
                ROUND(AVG(response_time_ms), 0) as avg_response_time,
                ROUND(AVG(CASE WHEN status = 'FAIL' THEN 100.0 ELSE 0.0 END), 1) as error_rate,
                COUNT(*) as total_checks
            FROM checks
            WHERE created_at > ?
            "#,
        )
        .bind(db_timestamp(&since))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| WatchError::StoreUnavailable(format!("Failed to summarize checks: {}", e)))?;

        Ok(CheckSummary {
            availability: row.availability.unwrap_or(0.0),
            avg_response_time: row.avg_response_time.unwrap_or(0.0),
            error_rate: row.error_rate.unwrap_or(0.0),
            total_checks: row.total_checks,
        })
    }
}
