//! Repository traitパターン定義
//!
//! チェック結果の永続化を抽象化し、スケジューラーのテストでは
//! インメモリ実装や失敗する実装に差し替えられるようにする。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driftwatch_common::error::WatchResult;
use driftwatch_common::types::CheckResult;

use super::checks::{CheckSummary, StoredCheck};

// ---------------------------------------------------------------------------
// CheckStore
// ---------------------------------------------------------------------------

/// チェック結果ストアのRepository trait
///
/// 追記のみ。失敗は `WatchError::StoreUnavailable` として返す。
#[async_trait]
pub trait CheckStore: Send + Sync {
    /// チェック結果を1件追記し、採番されたIDを返す
    async fn insert(&self, result: &CheckResult) -> WatchResult<i64>;
    /// 新しい順に最大 `limit` 件を取得
    async fn recent(&self, limit: usize) -> WatchResult<Vec<StoredCheck>>;
    /// `since` 以降のチェックを集計
    async fn summary_since(&self, since: DateTime<Utc>) -> WatchResult<CheckSummary>;
}
