//! メトリクス出力とパフォーマンスカウンター
//!
//! メトリクスは専用ターゲット [`METRICS_TARGET`] の tracing イベントとして出力され、
//! ロギング層が `metrics.log` に `TIMESTAMP - {json}` 形式で書き出す。

use chrono::Local;
use driftwatch_common::types::{CheckResult, Verdict};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;

/// メトリクスイベント用の tracing ターゲット
pub const METRICS_TARGET: &str = "driftwatch::metrics";

/// 応答時間履歴の保持数
pub const RESPONSE_HISTORY_LIMIT: usize = 100;

/// チェック応答時間（ミリ秒）
pub const CHECK_RESPONSE_TIME_MS: &str = "check_response_time_ms";
/// チェック時の時刻ずれ（秒）
pub const CHECK_DRIFT_SECONDS: &str = "check_drift_seconds";
/// サイクル所要時間（ミリ秒）
pub const CYCLE_DURATION_MS: &str = "cycle_duration_ms";
/// サイクル成功率（%）
pub const CYCLE_SUCCESS_RATE: &str = "cycle_success_rate";
/// 基準時刻フォールバック発生
pub const REFERENCE_TIME_FALLBACK: &str = "reference_time_fallback";
/// アラート送信失敗
pub const ALERT_SEND_FAILED: &str = "alert_send_failed";

/// メトリクスペイロードを組み立てる
pub fn metric_payload(metric: &str, value: Value, tags: &[(&str, &str)]) -> Value {
    let tags: Map<String, Value> = tags
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();
    json!({
        "timestamp": Local::now().to_rfc3339(),
        "metric": metric,
        "value": value,
        "tags": tags,
    })
}

/// メトリクスイベントを出力する
pub fn emit(metric: &str, value: impl Into<Value>, tags: &[(&str, &str)]) {
    let payload = metric_payload(metric, value.into(), tags);
    tracing::info!(target: METRICS_TARGET, "{}", payload);
}

/// スケジューラー所有のローリングカウンター
#[derive(Debug, Clone, Default)]
pub struct PerformanceCounters {
    /// 完了サイクル数
    pub total_cycles: u64,
    /// 実施チェック数（例外で中断したものを含む）
    pub total_checks: u64,
    /// PASS数
    pub passes: u64,
    /// FAIL数（例外を含む）
    pub failures: u64,
    /// チェック中の例外数
    pub errors: u64,
    /// 永続化失敗数
    pub persist_failures: u64,
    /// 基準時刻フォールバック数
    pub time_fallbacks: u64,
    response_times: VecDeque<u64>,
}

impl PerformanceCounters {
    /// 判定済みチェックを記録
    pub fn record_check(&mut self, result: &CheckResult) {
        self.total_checks += 1;
        match result.verdict {
            Verdict::Pass => self.passes += 1,
            Verdict::Fail => self.failures += 1,
        }
        if self.response_times.len() == RESPONSE_HISTORY_LIMIT {
            self.response_times.pop_front();
        }
        self.response_times.push_back(result.response_time_ms);
    }

    /// 例外で中断したチェックを記録（FAIL扱い）
    pub fn record_error(&mut self) {
        self.total_checks += 1;
        self.failures += 1;
        self.errors += 1;
    }

    /// 永続化失敗を記録
    pub fn record_persist_failure(&mut self) {
        self.persist_failures += 1;
    }

    /// 基準時刻フォールバックを記録
    pub fn record_time_fallback(&mut self) {
        self.time_fallbacks += 1;
    }

    /// サイクル完了を記録
    pub fn record_cycle(&mut self) {
        self.total_cycles += 1;
    }

    /// 直近の応答時間の平均（ミリ秒）
    pub fn average_response_time_ms(&self) -> Option<f64> {
        if self.response_times.is_empty() {
            return None;
        }
        let sum: u64 = self.response_times.iter().sum();
        Some(sum as f64 / self.response_times.len() as f64)
    }

    /// 保持中の応答時間サンプル数
    pub fn response_samples(&self) -> usize {
        self.response_times.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Utc};
    use driftwatch_common::types::Provenance;

    fn result(verdict: Verdict, response_time_ms: u64) -> CheckResult {
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 9, 2, 0, 0, 0)
            .unwrap();
        CheckResult {
            target: "web1:80".into(),
            container_id: "web1".into(),
            verdict,
            http_status: 200,
            body_contains_expected: true,
            drift_seconds: 0,
            response_time_ms,
            fetched_time: now,
            time_provenance: Provenance::External,
            local_time: now,
            created_at: Utc::now(),
            max_allowed_drift: 5,
        }
    }

    #[test]
    fn counts_verdicts_and_errors() {
        let mut counters = PerformanceCounters::default();
        counters.record_check(&result(Verdict::Pass, 10));
        counters.record_check(&result(Verdict::Fail, 30));
        counters.record_error();

        assert_eq!(counters.total_checks, 3);
        assert_eq!(counters.passes, 1);
        assert_eq!(counters.failures, 2);
        assert_eq!(counters.errors, 1);
        assert_eq!(counters.average_response_time_ms(), Some(20.0));
    }

    #[test]
    fn response_history_is_bounded() {
        let mut counters = PerformanceCounters::default();
        for i in 0..(RESPONSE_HISTORY_LIMIT as u64 + 50) {
            counters.record_check(&result(Verdict::Pass, i));
        }
        assert_eq!(counters.response_samples(), RESPONSE_HISTORY_LIMIT);
        // 直近100件（50..150）の平均
        assert_eq!(counters.average_response_time_ms(), Some(99.5));
    }

    #[test]
    fn empty_history_has_no_average() {
        assert_eq!(PerformanceCounters::default().average_response_time_ms(), None);
    }

    #[test]
    fn payload_shape() {
        let payload = metric_payload(CYCLE_SUCCESS_RATE, json!(50.0), &[("cycle", "3")]);
        assert_eq!(payload["metric"], "cycle_success_rate");
        assert_eq!(payload["value"], 50.0);
        assert_eq!(payload["tags"]["cycle"], "3");
        assert!(payload["timestamp"].is_string());
    }
}
