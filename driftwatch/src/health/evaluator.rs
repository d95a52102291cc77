//! チェック判定
//!
//! 基準時刻・ローカル時刻・HTTP応答から時刻ずれと PASS/FAIL を計算する純粋関数。

use chrono::{DateTime, FixedOffset, Utc};
use driftwatch_common::types::{CheckResult, ReferenceTime, Target, Verdict};

use super::probe::ProbeResponse;

/// 時刻ずれ（秒）を計算する
///
/// 秒未満は0方向に切り捨て、絶対値を返す。
pub fn drift_seconds(
    local_time: DateTime<FixedOffset>,
    fetched_time: DateTime<FixedOffset>,
) -> i64 {
    (local_time - fetched_time).num_seconds().abs()
}

/// 1ターゲット分のチェック結果を判定する
///
/// PASS条件: HTTP 200 かつ期待文字列を含む かつ ずれ <= 許容値。
/// いずれかが欠けた場合も全フィールドを埋めた FAIL を返し、
/// アラート本文で要因を示せるようにする。
pub fn evaluate(
    target: &Target,
    reference: &ReferenceTime,
    local_time: DateTime<FixedOffset>,
    response: &ProbeResponse,
    max_allowed_drift: i64,
) -> CheckResult {
    let drift = drift_seconds(local_time, reference.instant);
    let contains = response.body.contains(&target.expected_text);
    let ok = response.status == 200 && contains && drift <= max_allowed_drift;

    CheckResult {
        target: target.id(),
        container_id: target.container_id().to_string(),
        verdict: if ok { Verdict::Pass } else { Verdict::Fail },
        http_status: response.status,
        body_contains_expected: contains,
        drift_seconds: drift,
        response_time_ms: response.response_time_ms,
        fetched_time: reference.instant,
        time_provenance: reference.provenance,
        local_time,
        created_at: local_time.with_timezone(&Utc),
        max_allowed_drift,
    }
}
