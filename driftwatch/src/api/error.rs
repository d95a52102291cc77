//! APIエラーレスポンス型
//!
//! axum用の共通エラーハンドリング

use axum::{http::StatusCode, response::IntoResponse, Json};
use driftwatch_common::error::{ErrorKind, WatchError};
use serde_json::json;
use tracing::warn;

use crate::query::LogKind;

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(pub WatchError);

impl From<WatchError> for AppError {
    fn from(err: WatchError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // 詳細はログのみ。クライアントには external_message() を返す
        warn!(error = %self.0, "API request failed");

        let status = match self.0.kind() {
            ErrorKind::Configuration | ErrorKind::MalformedInput => StatusCode::BAD_REQUEST,
            ErrorKind::Persistence => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::TransientIo => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = match &self.0 {
            WatchError::UnknownLogType(_) => json!({
                "success": false,
                "error": self.0.external_message(),
                "available_types": LogKind::names(),
            }),
            _ => json!({
                "success": false,
                "error": self.0.external_message(),
            }),
        };

        (status, Json(payload)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: WatchError) -> (StatusCode, serde_json::Value) {
        let response = AppError(err).into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn unknown_log_type_lists_available_types() {
        let (status, body) = render(WatchError::UnknownLogType("nginx".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid log type");
        assert_eq!(body["available_types"], json!(["watchdog", "metrics"]));
    }

    #[tokio::test]
    async fn store_unavailable_is_503_without_details() {
        let (status, body) =
            render(WatchError::StoreUnavailable("sqlite:/var/lib/secret.db".into())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Database error");
        assert!(!body.to_string().contains("secret.db"));
    }

    #[tokio::test]
    async fn io_failure_is_500() {
        let err = WatchError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let (status, _) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
