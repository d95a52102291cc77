//! アラート送信
//!
//! チェック失敗時の通知を組み立てて送信する。送信失敗は呼び出し元へ伝播させず、
//! ログ・カウンター・メトリクスとして記録するのみ（監視ループを止めない）。

/// SMTP送信
pub mod smtp;

pub use smtp::SmtpAlertTransport;

use async_trait::async_trait;
use driftwatch_common::error::{WatchError, WatchResult};
use driftwatch_common::types::{CheckResult, Target};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::metrics;

/// アラート送信経路
#[async_trait]
pub trait AlertTransport: Send + Sync {
    /// 件名と本文を送信する
    async fn deliver(&self, subject: &str, body: &str) -> WatchResult<()>;
}

/// アラートディスパッチャー
pub struct AlertDispatcher {
    transport: Arc<dyn AlertTransport>,
    subject_prefix: String,
    timeout: Duration,
    sent: AtomicU64,
    failures: AtomicU64,
}

impl AlertDispatcher {
    /// 新しいディスパッチャーを作成
    pub fn new(
        transport: Arc<dyn AlertTransport>,
        subject_prefix: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            subject_prefix: subject_prefix.into(),
            timeout,
            sent: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// 件名・本文を送信する（失敗はエラーにしない）
    pub async fn send(&self, subject: &str, body: &str) {
        info!(subject = %subject, "Sending alert");
        let delivery = self.transport.deliver(subject, body);
        let outcome = match tokio::time::timeout(self.timeout, delivery).await {
            Ok(result) => result,
            Err(_) => Err(WatchError::Timeout(format!(
                "alert delivery exceeded {}ms",
                self.timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                info!(subject = %subject, "Alert sent successfully");
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(subject = %subject, error = %err, "Failed to send alert");
                metrics::emit(metrics::ALERT_SEND_FAILED, 1, &[("subject", subject)]);
            }
        }
    }

    /// 検証失敗アラート
    pub async fn validation_failed(&self, result: &CheckResult, expected_text: &str) {
        let subject = format!("{} Validation failed for {}", self.subject_prefix, result.target);
        self.send(&subject, &validation_failure_body(result, expected_text))
            .await;
    }

    /// チェック中の例外アラート
    pub async fn check_error(&self, target: &Target, err: &WatchError) {
        let subject = format!("{} Error while checking {}", self.subject_prefix, target);
        let body = format!("Error while checking {}: {}", target, err);
        self.send(&subject, &body).await;
    }

    /// 基準時刻取得失敗アラート
    pub async fn time_source_failed(&self, err: &WatchError) {
        let subject = format!("{} World time fetch failed", self.subject_prefix);
        let body = format!("Error fetching world time: {}", err);
        self.send(&subject, &body).await;
    }

    /// 送信成功数
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// 送信失敗数
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// 検証失敗アラートの本文
pub fn validation_failure_body(result: &CheckResult, expected_text: &str) -> String {
    let causes = result
        .failure_causes()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!(
        "Target={}\nHTTP={}, contains='{}'? {}\nDrift={}s (max {})\nFetched={} ({}), Local={}\nCauses={}\n",
        result.target,
        result.http_status,
        expected_text,
        result.body_contains_expected,
        result.drift_seconds,
        result.max_allowed_drift,
        result.fetched_time.to_rfc3339(),
        result.time_provenance,
        result.local_time.to_rfc3339(),
        causes,
    )
}
