//! 基準時刻の取得
//!
//! 外部タイムソース（worldtimeapi形式）から現在時刻を取得し、
//! 失敗時はローカル時計へフォールバックする。

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local};
use driftwatch_common::error::{WatchError, WatchResult};
use driftwatch_common::types::ReferenceTime;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::probe::map_reqwest_error;
use crate::metrics;

/// 外部タイムソース
#[async_trait]
pub trait TimeSource: Send + Sync {
    /// 現在時刻を取得する
    async fn fetch(&self) -> WatchResult<DateTime<FixedOffset>>;
}

/// ローカル時計
pub trait Clock: Send + Sync {
    /// 現在のローカル時刻
    fn now(&self) -> DateTime<FixedOffset>;
}

/// システム時計
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().into()
    }
}

#[derive(Debug, Deserialize)]
struct WorldTimePayload {
    datetime: String,
}

/// worldtimeapi.org 互換のタイムソース
#[derive(Clone)]
pub struct WorldTimeSource {
    client: Client,
    url: String,
}

impl WorldTimeSource {
    /// タイムアウト付きのタイムソースを作成
    pub fn new(url: impl Into<String>, timeout: Duration) -> WatchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::Internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// 取得先URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TimeSource for WorldTimeSource {
    async fn fetch(&self) -> WatchResult<DateTime<FixedOffset>> {
        debug!(url = %self.url, "Fetching reference time");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if response.status().as_u16() != 200 {
            return Err(WatchError::TimeSource(format!(
                "time source returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let payload: WorldTimePayload = response
            .json()
            .await
            .map_err(|e| WatchError::TimeSource(format!("malformed time payload: {e}")))?;

        DateTime::parse_from_rfc3339(&payload.datetime).map_err(|e| {
            WatchError::TimeSource(format!(
                "unparseable datetime '{}': {e}",
                payload.datetime
            ))
        })
    }
}

/// 基準時刻を取得する
///
/// `allow_fallback` が true の場合、タイムソースの失敗は警告とメトリクスのみで
/// ローカル時計の値（provenance=fallback）を返す。false の場合はエラーを返し、
/// 呼び出し側がアラートを送ってサイクルを中断する。
pub async fn acquire_reference_time(
    source: &dyn TimeSource,
    clock: &dyn Clock,
    allow_fallback: bool,
) -> WatchResult<ReferenceTime> {
    match source.fetch().await {
        Ok(instant) => Ok(ReferenceTime::external(instant)),
        Err(err) if allow_fallback => {
            let local = clock.now();
            warn!(
                error = %err,
                fallback_time = %local.to_rfc3339(),
                "Time source unavailable, using local clock as reference"
            );
            metrics::emit(
                metrics::REFERENCE_TIME_FALLBACK,
                1,
                &[("reason", err.external_message())],
            );
            Ok(ReferenceTime::fallback(local))
        }
        Err(err) => Err(err),
    }
}
