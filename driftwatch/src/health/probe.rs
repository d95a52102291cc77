//! HTTPプローブ
//!
//! 監視対象に `GET /` を送り、ステータスコードとボディを取得する。

use async_trait::async_trait;
use driftwatch_common::error::{WatchError, WatchResult};
use reqwest::Client;
use std::time::{Duration, Instant};

/// プローブ応答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    /// HTTPステータスコード
    pub status: u16,
    /// レスポンスボディ
    pub body: String,
    /// 応答時間（ミリ秒）
    pub response_time_ms: u64,
}

/// HTTPプローブインターフェース
#[async_trait]
pub trait HttpProbe: Send + Sync {
    /// URLにGETし、ステータスとボディを返す
    async fn get(&self, url: &str) -> WatchResult<ProbeResponse>;
}

/// reqwestによるHTTPプローブ
#[derive(Clone)]
pub struct ReqwestProbe {
    client: Client,
}

impl ReqwestProbe {
    /// タイムアウト付きのプローブを作成
    pub fn new(timeout: Duration) -> WatchResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WatchError::Internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> WatchError {
    if err.is_timeout() {
        WatchError::Timeout(err.to_string())
    } else {
        WatchError::Http(err.to_string())
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &str) -> WatchResult<ProbeResponse> {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(ProbeResponse {
            status,
            body,
            response_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}
