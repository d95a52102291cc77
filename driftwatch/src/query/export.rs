//! ログのエクスポート（JSON / CSV）

use driftwatch_common::error::{CommonError, WatchError, WatchResult};
use serde::{Deserialize, Serialize};

use super::filter::LogEntry;

/// エクスポート形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// 構造化（JSON配列）
    #[default]
    Json,
    /// 区切り文字形式（CSV）
    Csv,
}

impl ExportFormat {
    /// 形式名から解釈する
    pub fn parse(name: &str) -> WatchResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(WatchError::MalformedInput(format!(
                "unsupported export format: {}",
                other
            ))),
        }
    }

    /// Content-Type
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }

    /// ファイル拡張子
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

/// 構造化エクスポートのレコード
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRecord {
    /// タイムスタンプ（ログ書式のまま）
    pub timestamp: Option<String>,
    /// 行自身のレベル
    pub level: Option<String>,
    /// メッセージ
    pub message: String,
    /// 元の行
    pub raw: String,
}

impl From<&LogEntry> for ExportRecord {
    fn from(entry: &LogEntry) -> Self {
        Self {
            timestamp: entry.parsed.timestamp_text.clone(),
            level: entry.parsed.level_token.clone(),
            message: entry.parsed.message(),
            raw: entry.parsed.raw.clone(),
        }
    }
}

/// エントリを指定形式でレンダリングする
pub fn render(entries: &[LogEntry], format: ExportFormat) -> WatchResult<Vec<u8>> {
    match format {
        ExportFormat::Json => {
            let records: Vec<ExportRecord> = entries.iter().map(ExportRecord::from).collect();
            serde_json::to_vec_pretty(&records)
                .map_err(|e| WatchError::Common(CommonError::Serialization(e)))
        }
        ExportFormat::Csv => render_csv(entries),
    }
}

fn render_csv(entries: &[LogEntry]) -> WatchResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer
        .write_record(["Timestamp", "Level", "Message"])
        .map_err(|e| WatchError::Internal(format!("Failed to write CSV header: {}", e)))?;

    for entry in entries {
        let record = ExportRecord::from(entry);
        writer
            .write_record([
                record.timestamp.as_deref().unwrap_or(""),
                record.level.as_deref().unwrap_or(""),
                record.message.as_str(),
            ])
            .map_err(|e| WatchError::Internal(format!("Failed to write CSV row: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| WatchError::Internal(format!("Failed to finalize CSV: {}", e)))
}
