//! 共通型定義
//!
//! Target, ReferenceTime, CheckResult等のコアデータ型

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommonError;

/// 監視対象（`host:port` + 期待コンテンツ）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    /// ホスト名
    pub host: String,
    /// ポート番号
    pub port: u16,
    /// レスポンスボディに含まれるべき文字列
    pub expected_text: String,
}

impl Target {
    /// `host:port` 形式の文字列から監視対象を生成する
    pub fn parse(spec: &str, expected_text: &str) -> Result<Self, CommonError> {
        let spec = spec.trim();
        let (host, port) = spec
            .rsplit_once(':')
            .ok_or_else(|| CommonError::Validation(format!("target '{spec}' is not host:port")))?;
        if host.is_empty() {
            return Err(CommonError::Validation(format!(
                "target '{spec}' has an empty host"
            )));
        }
        let port = u16::from_str(port).map_err(|_| {
            CommonError::Validation(format!("target '{spec}' has an invalid port '{port}'"))
        })?;
        Ok(Self {
            host: host.to_string(),
            port,
            expected_text: expected_text.to_string(),
        })
    }

    /// `host:port` 形式の識別子
    pub fn id(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// コンテナ識別子（ホスト部）
    pub fn container_id(&self) -> &str {
        &self.host
    }

    /// ヘルスチェック対象URL
    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// 基準時刻の取得元
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// 外部タイムソースから取得
    External,
    /// ローカル時計へのフォールバック
    Fallback,
}

impl Provenance {
    /// DB/ログ用の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::External => "external",
            Provenance::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 基準時刻
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceTime {
    /// 時刻（タイムゾーンオフセット付き）
    pub instant: DateTime<FixedOffset>,
    /// 取得元
    pub provenance: Provenance,
}

impl ReferenceTime {
    /// 外部タイムソース由来の基準時刻
    pub fn external(instant: DateTime<FixedOffset>) -> Self {
        Self {
            instant,
            provenance: Provenance::External,
        }
    }

    /// ローカル時計由来の基準時刻
    pub fn fallback(instant: DateTime<FixedOffset>) -> Self {
        Self {
            instant,
            provenance: Provenance::Fallback,
        }
    }
}

/// 判定結果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// 合格
    Pass,
    /// 不合格
    Fail,
}

impl Verdict {
    /// DB/ログ用の文字列表現
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }

    /// 合格かどうか
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 不合格の要因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum FailureCause {
    /// HTTPステータスが200以外
    HttpStatus {
        /// 実際のステータス
        status: u16,
    },
    /// 期待文字列がボディに含まれない
    MissingExpectedContent,
    /// 時刻ずれが許容値を超過
    DriftExceeded {
        /// 実測ずれ（秒）
        drift_seconds: i64,
        /// 許容値（秒）
        max_allowed: i64,
    },
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::HttpStatus { status } => write!(f, "HTTP status {status} != 200"),
            FailureCause::MissingExpectedContent => f.write_str("expected content missing"),
            FailureCause::DriftExceeded {
                drift_seconds,
                max_allowed,
            } => write!(f, "drift {drift_seconds}s exceeds {max_allowed}s"),
        }
    }
}

/// 1ターゲット1サイクル分のチェック結果（永続化前）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    /// 監視対象識別子（`host:port`）
    pub target: String,
    /// コンテナ識別子
    pub container_id: String,
    /// 判定
    pub verdict: Verdict,
    /// HTTPステータスコード
    pub http_status: u16,
    /// 期待文字列を含んでいたか
    pub body_contains_expected: bool,
    /// 時刻ずれ（秒、常に非負）
    pub drift_seconds: i64,
    /// 応答時間（ミリ秒）
    pub response_time_ms: u64,
    /// 基準時刻
    pub fetched_time: DateTime<FixedOffset>,
    /// 基準時刻の取得元
    pub time_provenance: Provenance,
    /// ローカル時刻
    pub local_time: DateTime<FixedOffset>,
    /// 生成日時
    pub created_at: DateTime<Utc>,
    /// 最大許容ずれ（秒）
    pub max_allowed_drift: i64,
}

impl CheckResult {
    /// 不合格要因の一覧（合格時は空）
    pub fn failure_causes(&self) -> Vec<FailureCause> {
        let mut causes = Vec::new();
        if self.http_status != 200 {
            causes.push(FailureCause::HttpStatus {
                status: self.http_status,
            });
        }
        if !self.body_contains_expected {
            causes.push(FailureCause::MissingExpectedContent);
        }
        if self.drift_seconds > self.max_allowed_drift {
            causes.push(FailureCause::DriftExceeded {
                drift_seconds: self.drift_seconds,
                max_allowed: self.max_allowed_drift,
            });
        }
        causes
    }
}
