//! 遅延接続するチェックストア
//!
//! 起動時にデータベースを開けなくても監視ループは止めない。接続できるまで
//! 各操作のたびに開き直し、失敗は `WatchError::StoreUnavailable` として返す。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driftwatch_common::error::WatchResult;
use driftwatch_common::types::CheckResult;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::checks::{CheckSummary, SqliteCheckStore, StoredCheck};
use super::migrations::initialize_database;
use super::traits::CheckStore;

/// 接続を遅延させる SQLite チェックストア
pub struct LazyCheckStore {
    database_url: String,
    inner: Mutex<Option<SqliteCheckStore>>,
}

impl LazyCheckStore {
    /// 一度だけ接続を試み、失敗しても未接続のストアを返す
    pub async fn connect(database_url: impl Into<String>) -> Self {
        let store = Self {
            database_url: database_url.into(),
            inner: Mutex::new(None),
        };
        if let Err(err) = store.store().await {
            warn!(
                url = %store.database_url,
                error = %err,
                "Check store unavailable, results will be dropped until it can be opened"
            );
        }
        store
    }

    /// 接続済みかどうか
    pub async fn is_connected(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    async fn store(&self) -> WatchResult<SqliteCheckStore> {
        let mut inner = self.inner.lock().await;
        if let Some(store) = inner.as_ref() {
            return Ok(store.clone());
        }
        let pool = initialize_database(&self.database_url).await?;
        info!(url = %self.database_url, "Check store opened");
        let store = SqliteCheckStore::new(pool);
        *inner = Some(store.clone());
        Ok(store)
    }
}

#[async_trait]
impl CheckStore for LazyCheckStore {
    async fn insert(&self, result: &CheckResult) -> WatchResult<i64> {
        self.store().await?.insert(result).await
    }

    async fn recent(&self, limit: usize) -> WatchResult<Vec<StoredCheck>> {
        self.store().await?.recent(limit).await
    }

    async fn summary_since(&self, since: DateTime<Utc>) -> WatchResult<CheckSummary> {
        self.store().await?.summary_since(since).await
    }
}
