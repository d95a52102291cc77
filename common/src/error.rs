//! エラー型定義
//!
//! 統一エラー型（thiserror使用）
//!
//! `WatchError::kind()` で障害分類（一時的I/O障害・永続化障害・不正入力・設定エラー）
//! を取得でき、呼び出し側はこれをもとにフォールバック/アラート/拒否を決める。

use thiserror::Error;

/// Common layer error type
#[derive(Debug, Error)]
pub enum CommonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// 障害分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// ネットワーク・タイムソース・HTTP・アラート送信の一時的障害
    TransientIo,
    /// 永続化ストアに到達できない
    Persistence,
    /// 不正な入力（正規表現・タイムスタンプ・ログ行）
    MalformedInput,
    /// 設定・リクエストの不正（未知のログ種別やターゲット）
    Configuration,
}

/// watchdog / log API error type
#[derive(Debug, Error)]
pub enum WatchError {
    /// Common layer error
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Reference time source failure
    #[error("Time source error: {0}")]
    TimeSource(String),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Http(String),

    /// Timeout error
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Alert transport error
    #[error("Alert transport error: {0}")]
    Alert(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Check store unreachable or write rejected
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed input
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Unknown log type
    #[error("Unknown log type: {0}")]
    UnknownLogType(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WatchError {
    /// 障害分類を返す
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Common(CommonError::Serialization(_)) => ErrorKind::MalformedInput,
            Self::Common(_) => ErrorKind::Configuration,
            Self::TimeSource(_)
            | Self::Http(_)
            | Self::Timeout(_)
            | Self::Alert(_)
            | Self::Io(_)
            | Self::Internal(_) => ErrorKind::TransientIo,
            Self::StoreUnavailable(_) => ErrorKind::Persistence,
            Self::MalformedInput(_) => ErrorKind::MalformedInput,
            Self::UnknownLogType(_) => ErrorKind::Configuration,
        }
    }

    /// Returns a safe error message for external clients.
    ///
    /// Full details (`to_string()`) are only written to server logs.
    pub fn external_message(&self) -> &'static str {
        match self {
            Self::Common(_) => "Request error",
            Self::TimeSource(_) => "Time source unavailable",
            Self::Http(_) => "Backend service unavailable",
            Self::Timeout(_) => "Request timeout",
            Self::Alert(_) => "Alert transport unavailable",
            Self::Io(_) => "Log file unavailable",
            Self::StoreUnavailable(_) => "Database error",
            Self::MalformedInput(_) => "Malformed input",
            Self::UnknownLogType(_) => "Invalid log type",
            Self::Internal(_) => "Internal server error",
        }
    }
}

/// Result type alias (watchdog / log API)
pub type WatchResult<T> = Result<T, WatchError>;
