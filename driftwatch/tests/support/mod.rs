//! 統合テスト共通ユーティリティ

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone};
use driftwatch::alert::AlertTransport;
use driftwatch::health::Clock;
use driftwatch_common::error::WatchResult;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// 送信内容を記録するアラート経路
#[derive(Default)]
pub struct RecordingTransport {
    pub delivered: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    pub fn subjects(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(subject, _)| subject.clone())
            .collect()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }
}

#[async_trait]
impl AlertTransport for RecordingTransport {
    async fn deliver(&self, subject: &str, body: &str) -> WatchResult<()> {
        self.delivered
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// 固定時刻を返す時計
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Asia/Colombo (+05:30) の基準時刻
pub fn colombo(secs_after: i64) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(5 * 3600 + 1800)
        .unwrap()
        .with_ymd_and_hms(2025, 9, 2, 7, 28, 0)
        .unwrap()
        + chrono::Duration::seconds(secs_after)
}

/// worldtimeapi 形式のレスポンスボディ
pub fn world_time_body(instant: DateTime<FixedOffset>) -> serde_json::Value {
    serde_json::json!({
        "datetime": instant.to_rfc3339(),
        "timezone": "Asia/Colombo",
        "utc_offset": "+05:30",
    })
}

/// ログファイルを書き出す
pub fn write_log(dir: &Path, name: &str, lines: &[&str]) {
    let mut file = std::fs::File::create(dir.join(name)).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
}
