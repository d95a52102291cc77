//! REST APIハンドラー
//!
//! ログ閲覧・エクスポート、チェック結果サマリー、ヘルスチェック

/// APIエラー型
pub mod error;
/// ログ閲覧API
pub mod logs;
/// チェック結果サマリーAPI
pub mod metrics;

use crate::AppState;
use axum::{routing::get, Json, Router};
use chrono::Local;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// `/health` が返すサービス名
pub const SERVICE_NAME: &str = "driftwatch-log-api";

/// APIルーターを作成
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/logs", get(logs::get_logs))
        .route("/api/logs/export", get(logs::export_logs))
        .route("/api/log_levels", get(logs::get_log_levels))
        .route("/api/metrics", get(metrics::get_metrics))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "timestamp": Local::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_utils::test_db_pool, CheckStore, SqliteCheckStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use chrono::{FixedOffset, TimeZone, Utc};
    use driftwatch_common::types::{CheckResult, Provenance, Verdict};
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn log_dir() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut watchdog = std::fs::File::create(dir.path().join("watchdog.log")).unwrap();
        for line in [
            "2025-09-02 01:00:00,000 - watchdog - INFO - Validation PASS for web1:80",
            "2025-09-02 01:01:00,000 - watchdog - ERROR - Exception while checking web2:80",
            "Traceback (most recent call last):",
            "2025-09-02 01:02:00,000 - watchdog - WARNING - World time fetch failed <timeout>",
            "2025-09-02 02:00:00,000 - watchdog - INFO - Validation PASS for web2:80",
        ] {
            writeln!(watchdog, "{}", line).unwrap();
        }
        let mut metrics = std::fs::File::create(dir.path().join("metrics.log")).unwrap();
        writeln!(
            metrics,
            r#"2025-09-02 01:00:00,000 - {{"metric": "check_drift_seconds", "value": 3, "tags": {{"target": "web1:80"}}}}"#
        )
        .unwrap();
        dir
    }

    fn app(dir: &TempDir) -> Router {
        create_app(AppState {
            log_dir: dir.path().to_path_buf(),
            store: None,
        })
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn health_reports_service() {
        let dir = log_dir();
        let (status, body) = get_json(app(&dir), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], SERVICE_NAME);
    }

    #[tokio::test]
    async fn logs_are_formatted_and_counted() {
        let dir = log_dir();
        let (status, body) = get_json(app(&dir), "/api/logs?lines=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["type"], "watchdog");
        assert_eq!(body["level_filter"], "ALL");
        assert_eq!(body["count"], 2);
        assert_eq!(body["total_lines"], 4);
        let last = body["lines"][1].as_str().unwrap();
        assert!(last.contains("<span class=\"log-info\">INFO</span>"));
        let warning = body["lines"][0].as_str().unwrap();
        assert!(warning.ends_with("World time fetch failed &lt;timeout&gt;"));
        assert!(body.get("statistics").is_none());
    }

    #[tokio::test]
    async fn error_filter_keeps_traceback_and_reports_stats() {
        let dir = log_dir();
        let (_, body) = get_json(app(&dir), "/api/logs?level=ERROR&stats=true").await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["lines"][1], "Traceback (most recent call last):");
        assert_eq!(body["statistics"]["total_lines"], 2);
        assert_eq!(body["statistics"]["level_counts"]["ERROR"], 1);
        assert_eq!(body["statistics"]["level_counts"]["UNKNOWN"], 1);
    }

    #[tokio::test]
    async fn invalid_regex_degrades_to_literal_search() {
        let dir = log_dir();
        let (status, body) = get_json(app(&dir), "/api/logs?search=%28most").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn time_range_filter() {
        let dir = log_dir();
        let (_, body) = get_json(
            app(&dir),
            "/api/logs?start=2025-09-02T01:00:30&end=2025-09-02T01:30",
        )
        .await;
        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn unknown_type_is_bad_request() {
        let dir = log_dir();
        let (status, body) = get_json(app(&dir), "/api/logs?type=nginx").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid log type");
        assert_eq!(body["available_types"][1], "metrics");
    }

    #[tokio::test]
    async fn metrics_log_type() {
        let dir = log_dir();
        let (_, body) = get_json(app(&dir), "/api/logs?type=metrics").await;
        assert_eq!(body["count"], 1);
        assert!(body["lines"][0]
            .as_str()
            .unwrap()
            .contains("<span class=\"log-info\">check_drift_seconds</span>"));
    }

    #[tokio::test]
    async fn log_levels_start_with_all() {
        let dir = log_dir();
        let (status, body) = get_json(app(&dir), "/api/log_levels").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["available_levels"],
            json!(["ALL", "ERROR", "WARNING", "INFO"])
        );
        assert!(body.get("levels").is_none());
        assert_eq!(body["level_counts"]["INFO"], 2);
    }

    #[tokio::test]
    async fn csv_export_is_an_attachment() {
        let dir = log_dir();
        let response = app(&dir)
            .oneshot(
                Request::builder()
                    .uri("/api/logs/export?format=csv&level=INFO")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"watchdog_logs_"));
        assert!(disposition.ends_with(".csv\""));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Timestamp,Level,Message"));
        assert_eq!(lines.count(), 2);
    }

    #[tokio::test]
    async fn unsupported_export_format_is_bad_request() {
        let dir = log_dir();
        let (status, _) = get_json(app(&dir), "/api/logs/export?format=xml").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn metrics_without_store_is_unavailable() {
        let dir = log_dir();
        let (status, body) = get_json(app(&dir), "/api/metrics").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Database error");
    }

    #[tokio::test]
    async fn metrics_summarize_recent_checks() {
        let dir = log_dir();
        let store = SqliteCheckStore::new(test_db_pool().await);
        let fetched = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 9, 2, 1, 0, 0)
            .unwrap();
        for (verdict, status) in [(Verdict::Pass, 200), (Verdict::Fail, 500)] {
            store
                .insert(&CheckResult {
                    target: "web1:80".into(),
                    container_id: "web1".into(),
                    verdict,
                    http_status: status,
                    body_contains_expected: verdict.is_pass(),
                    drift_seconds: 1,
                    response_time_ms: 40,
                    fetched_time: fetched,
                    time_provenance: Provenance::External,
                    local_time: fetched,
                    created_at: Utc::now(),
                    max_allowed_drift: 5,
                })
                .await
                .unwrap();
        }

        let app = create_app(AppState {
            log_dir: dir.path().to_path_buf(),
            store: Some(Arc::new(store)),
        });
        let (status, body) = get_json(app, "/api/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metrics"]["total_checks"], 2);
        assert_eq!(body["metrics"]["availability"], 50.0);
        assert_eq!(body["metrics"]["error_rate"], 50.0);
        assert_eq!(body["metrics"]["avg_response_time"], 40.0);
    }
}
