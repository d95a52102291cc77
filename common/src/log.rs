//! ログ行パーサー
//!
//! watchdogが出力する2種類のログ行文法を解釈する。
//!
//! - アプリケーションログ: `YYYY-MM-DD HH:MM:SS,mmm - LOGGER - LEVEL - MESSAGE`
//! - メトリクスログ: `YYYY-MM-DD HH:MM:SS,mmm - {"metric": ..., "value": ..., "tags": {...}}`
//!
//! パースは失敗しない。文法に一致しない行は全フィールドが空の `ParsedLine`
//! になり、元の行はそのまま保持される。

use chrono::{NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// タイムスタンプ書式（ミリ秒はカンマ区切り）
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

const TIMESTAMP_LEN: usize = 23;

static APPLICATION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3}) - (\S+) - (\w+) - (.*)$")
        .expect("application log pattern")
});

static METRIC_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3}) - (.+)$").expect("metric log pattern")
});

/// ログ行文法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogGrammar {
    /// `TIMESTAMP - LOGGER - LEVEL - MESSAGE`
    Application,
    /// `TIMESTAMP - JSON{metric,value,tags}`
    Metric,
}

/// ログレベル
///
/// 既知でないトークンは大文字化して `Other` にそのまま保持する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    /// ERROR
    Error,
    /// WARNING / WARN
    Warning,
    /// INFO
    Info,
    /// DEBUG
    Debug,
    /// その他のトークン（大文字化済み）
    Other(String),
}

impl LogLevel {
    /// トークンからレベルを判定する（大文字小文字を区別しない）
    pub fn from_token(token: &str) -> Self {
        let upper = token.to_ascii_uppercase();
        match upper.as_str() {
            "ERROR" => LogLevel::Error,
            "WARNING" | "WARN" => LogLevel::Warning,
            "INFO" => LogLevel::Info,
            "DEBUG" => LogLevel::Debug,
            _ => LogLevel::Other(upper),
        }
    }

    /// 表示名
    pub fn as_str(&self) -> &str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Other(token) => token,
        }
    }

    /// 統計用のバケット名（既知以外は UNKNOWN）
    pub fn stats_bucket(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Other(_) => "UNKNOWN",
        }
    }

    /// 重要度順（小さいほど重要）
    pub fn severity_rank(&self) -> u8 {
        match self {
            LogLevel::Error => 1,
            LogLevel::Warning => 2,
            LogLevel::Info => 3,
            LogLevel::Debug => 4,
            LogLevel::Other(_) => 5,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// メトリクス行のJSONペイロード
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFields {
    /// メトリクス名（欠落時は "unknown"）
    pub metric: String,
    /// 値（欠落時は "N/A"）
    pub value: Value,
    /// タグ
    pub tags: BTreeMap<String, Value>,
}

impl MetricFields {
    fn from_payload(payload: &str) -> Option<Self> {
        let decoded: Value = serde_json::from_str(payload).ok()?;
        let object = decoded.as_object()?;
        let metric = object
            .get("metric")
            .map(value_text)
            .unwrap_or_else(|| "unknown".to_string());
        let value = object
            .get("value")
            .cloned()
            .unwrap_or_else(|| Value::String("N/A".to_string()));
        let tags = object
            .get("tags")
            .and_then(Value::as_object)
            .map(|tags| tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        Some(Self {
            metric,
            value,
            tags,
        })
    }

    /// 値の表示文字列
    pub fn value_text(&self) -> String {
        value_text(&self.value)
    }

    /// タグの表示文字列（`k=v, k2=v2`、タグなしなら空）
    pub fn tags_text(&self) -> String {
        self.tags
            .iter()
            .map(|(k, v)| format!("{}={}", k, value_text(v)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `metric: value [tags]` 形式の要約
    pub fn summary(&self) -> String {
        let tags = self.tags_text();
        if tags.is_empty() {
            format!("{}: {}", self.metric, self.value_text())
        } else {
            format!("{}: {} [{}]", self.metric, self.value_text(), tags)
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// ログ行本体
#[derive(Debug, Clone, PartialEq)]
pub enum LineBody {
    /// アプリケーションログのメッセージ
    Message {
        /// ロガー名
        logger: String,
        /// メッセージ
        message: String,
    },
    /// メトリクスイベント
    Metric(MetricFields),
    /// 文法に一致しない（あるいはJSONが壊れている）本体
    Raw(String),
}

/// パース済みログ行
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    /// 元の行（改行除去のみ）
    pub raw: String,
    /// タイムスタンプ
    pub timestamp: Option<NaiveDateTime>,
    /// 元のタイムスタンプ文字列
    pub timestamp_text: Option<String>,
    /// ログレベル
    pub level: Option<LogLevel>,
    /// 元のレベルトークン（大文字化済み）
    pub level_token: Option<String>,
    /// 本体
    pub body: LineBody,
}

impl ParsedLine {
    fn unstructured(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            timestamp: None,
            timestamp_text: None,
            level: None,
            level_token: None,
            body: LineBody::Raw(raw.trim().to_string()),
        }
    }

    /// 表示用メッセージ
    ///
    /// メトリクス行は要約文字列、文法外の行は行全体を返す。
    pub fn message(&self) -> String {
        match &self.body {
            LineBody::Message { message, .. } => message.clone(),
            LineBody::Metric(fields) => fields.summary(),
            LineBody::Raw(text) => text.clone(),
        }
    }

    /// 空行かどうか
    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

/// タイムスタンプ文字列をパースする
///
/// `YYYY-MM-DD HH:MM:SS,mmm` に厳密一致した場合のみ `Some` を返す。
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    if text.len() != TIMESTAMP_LEN || text.as_bytes()[19] != b',' {
        return None;
    }
    let (head, millis) = text.split_at(19);
    let millis = &millis[1..];
    if !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let millis: u32 = millis.parse().ok()?;
    let base = NaiveDateTime::parse_from_str(head, "%Y-%m-%d %H:%M:%S").ok()?;
    base.with_nanosecond(millis * 1_000_000)
}

/// タイムスタンプをログ書式で整形する
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// ログ行をパースする
pub fn parse_line(line: &str, grammar: LogGrammar) -> ParsedLine {
    let raw = line.trim_end_matches(['\n', '\r']);
    let trimmed = raw.trim();

    match grammar {
        LogGrammar::Application => {
            let Some(caps) = APPLICATION_LINE.captures(trimmed) else {
                return ParsedLine::unstructured(raw);
            };
            let Some(timestamp) = parse_timestamp(&caps[1]) else {
                return ParsedLine::unstructured(raw);
            };
            let level = LogLevel::from_token(&caps[3]);
            ParsedLine {
                raw: raw.to_string(),
                timestamp: Some(timestamp),
                timestamp_text: Some(caps[1].to_string()),
                level_token: Some(caps[3].to_ascii_uppercase()),
                level: Some(level),
                body: LineBody::Message {
                    logger: caps[2].to_string(),
                    message: caps[4].to_string(),
                },
            }
        }
        LogGrammar::Metric => {
            let Some(caps) = METRIC_LINE.captures(trimmed) else {
                return ParsedLine::unstructured(raw);
            };
            let Some(timestamp) = parse_timestamp(&caps[1]) else {
                return ParsedLine::unstructured(raw);
            };
            let body = match MetricFields::from_payload(&caps[2]) {
                Some(fields) => LineBody::Metric(fields),
                None => LineBody::Raw(trimmed.to_string()),
            };
            ParsedLine {
                raw: raw.to_string(),
                timestamp: Some(timestamp),
                timestamp_text: Some(caps[1].to_string()),
                level: None,
                level_token: None,
                body,
            }
        }
    }
}

/// アプリケーションログ行を組み立てる
pub fn format_application_line(
    timestamp: &NaiveDateTime,
    logger: &str,
    level: &LogLevel,
    message: &str,
) -> String {
    format!(
        "{} - {} - {} - {}",
        format_timestamp(timestamp),
        logger,
        level.as_str(),
        message
    )
}
