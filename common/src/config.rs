//! 設定管理
//!
//! WatchdogConfig, SmtpConfig, LogApiConfig等の設定構造体

use serde::{Deserialize, Serialize};

use crate::error::CommonError;
use crate::types::Target;

/// watchdog設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchdogConfig {
    /// 監視対象（`host:port`）一覧 (デフォルト: web1:80, web2:80)
    #[serde(default = "default_targets")]
    pub targets: Vec<String>,

    /// 期待コンテンツ (デフォルト: "Velaris Demo OK")
    #[serde(default = "default_expect_text")]
    pub expect_text: String,

    /// チェック間隔（秒）(デフォルト: 60)
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// 最大許容ずれ（秒）(デフォルト: 5)
    #[serde(default = "default_max_drift")]
    pub max_allowed_drift_secs: i64,

    /// 基準タイムゾーン名 (デフォルト: "Asia/Colombo")
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// 外部タイムソースURL（未指定時はタイムゾーンから組み立てる）
    #[serde(default)]
    pub time_source_url: Option<String>,

    /// 外部タイムソースが使えない場合にローカル時計へフォールバックするか (デフォルト: true)
    #[serde(default = "default_true")]
    pub allow_time_fallback: bool,

    /// タイムソースのタイムアウト（秒）(デフォルト: 5)
    #[serde(default = "default_time_source_timeout")]
    pub time_source_timeout_secs: u64,

    /// HTTPプローブのタイムアウト（秒）(デフォルト: 10)
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// 永続化のタイムアウト（秒）(デフォルト: 10)
    #[serde(default = "default_persist_timeout")]
    pub persist_timeout_secs: u64,

    /// ステータスページ出力先ディレクトリ (デフォルト: "/sites")
    #[serde(default = "default_sites_dir")]
    pub sites_dir: String,
}

fn default_targets() -> Vec<String> {
    vec!["web1:80".to_string(), "web2:80".to_string()]
}

fn default_expect_text() -> String {
    "Velaris Demo OK".to_string()
}

fn default_check_interval() -> u64 {
    60
}

fn default_max_drift() -> i64 {
    5
}

fn default_timezone() -> String {
    "Asia/Colombo".to_string()
}

fn default_true() -> bool {
    true
}

fn default_time_source_timeout() -> u64 {
    5
}

fn default_probe_timeout() -> u64 {
    10
}

fn default_persist_timeout() -> u64 {
    10
}

fn default_sites_dir() -> String {
    "/sites".to_string()
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            expect_text: default_expect_text(),
            check_interval_secs: default_check_interval(),
            max_allowed_drift_secs: default_max_drift(),
            timezone: default_timezone(),
            time_source_url: None,
            allow_time_fallback: true,
            time_source_timeout_secs: default_time_source_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            persist_timeout_secs: default_persist_timeout(),
            sites_dir: default_sites_dir(),
        }
    }
}

impl WatchdogConfig {
    /// 外部タイムソースURL
    pub fn time_source_url(&self) -> String {
        self.time_source_url.clone().unwrap_or_else(|| {
            format!("http://worldtimeapi.org/api/timezone/{}", self.timezone)
        })
    }

    /// 監視対象を検証してパースする
    ///
    /// 1件でも不正な指定があれば起動時エラーとする。
    pub fn parse_targets(&self) -> Result<Vec<Target>, CommonError> {
        let targets = self
            .targets
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| Target::parse(t, &self.expect_text))
            .collect::<Result<Vec<_>, _>>()?;
        if targets.is_empty() {
            return Err(CommonError::Config("no targets configured".to_string()));
        }
        Ok(targets)
    }
}

/// SMTP設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmtpConfig {
    /// SMTPホスト (デフォルト: "mailhog")
    #[serde(default = "default_smtp_host")]
    pub host: String,

    /// SMTPポート (デフォルト: 1025)
    #[serde(default = "default_smtp_port")]
    pub port: u16,

    /// 送信元アドレス
    #[serde(default = "default_smtp_from")]
    pub from: String,

    /// 宛先アドレス
    #[serde(default = "default_smtp_to")]
    pub to: String,

    /// 認証ユーザー
    #[serde(default)]
    pub username: Option<String>,

    /// 認証パスワード
    #[serde(default)]
    pub password: Option<String>,

    /// 認証なしで送信するテスト用リレーホスト (デフォルト: "mailhog")
    #[serde(default = "default_smtp_host")]
    pub test_relay_host: String,

    /// 送信タイムアウト（秒）(デフォルト: 10)
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,

    /// 件名プレフィックス (デフォルト: "[Velaris]")
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_smtp_host() -> String {
    "mailhog".to_string()
}

fn default_smtp_port() -> u16 {
    1025
}

fn default_smtp_from() -> String {
    "alerts@velaris.local".to_string()
}

fn default_smtp_to() -> String {
    "support@velaris.local".to_string()
}

fn default_smtp_timeout() -> u64 {
    10
}

fn default_subject_prefix() -> String {
    "[Velaris]".to_string()
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            from: default_smtp_from(),
            to: default_smtp_to(),
            username: None,
            password: None,
            test_relay_host: default_smtp_host(),
            timeout_secs: default_smtp_timeout(),
            subject_prefix: default_subject_prefix(),
        }
    }
}

impl SmtpConfig {
    /// 認証付き暗号化トランスポートを使うべきか
    ///
    /// 資格情報が揃っており、宛先がテスト用リレーでない場合のみ true。
    pub fn use_authenticated_tls(&self) -> bool {
        self.host != self.test_relay_host && self.username.is_some() && self.password.is_some()
    }
}

/// ログAPI設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogApiConfig {
    /// ホストアドレス (デフォルト: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// ポート番号 (デフォルト: 5000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// ログディレクトリ (デフォルト: "/var/log/monitoring")
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_log_dir() -> String {
    "/var/log/monitoring".to_string()
}

impl Default for LogApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_dir: default_log_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watchdog_config_defaults() {
        let config = WatchdogConfig::default();

        assert_eq!(config.targets, vec!["web1:80", "web2:80"]);
        assert_eq!(config.expect_text, "Velaris Demo OK");
        assert_eq!(config.check_interval_secs, 60);
        assert_eq!(config.max_allowed_drift_secs, 5);
        assert!(config.allow_time_fallback);
        assert_eq!(
            config.time_source_url(),
            "http://worldtimeapi.org/api/timezone/Asia/Colombo"
        );
    }

    #[test]
    fn test_watchdog_config_deserialization() {
        let json = r#"{"targets":["app:8080"],"max_allowed_drift_secs":2}"#;
        let config: WatchdogConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.targets, vec!["app:8080"]);
        assert_eq!(config.max_allowed_drift_secs, 2);
        // デフォルト値が適用される
        assert_eq!(config.check_interval_secs, 60);
        assert_eq!(config.probe_timeout_secs, 10);
    }

    #[test]
    fn test_parse_targets_rejects_invalid_entry() {
        let config = WatchdogConfig {
            targets: vec!["web1:80".into(), "web2".into()],
            ..Default::default()
        };
        assert!(matches!(
            config.parse_targets(),
            Err(CommonError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_targets_skips_blank_and_rejects_empty() {
        let config = WatchdogConfig {
            targets: vec!["web1:80".into(), " ".into()],
            ..Default::default()
        };
        assert_eq!(config.parse_targets().unwrap().len(), 1);

        let empty = WatchdogConfig {
            targets: vec![],
            ..Default::default()
        };
        assert!(matches!(empty.parse_targets(), Err(CommonError::Config(_))));
    }

    #[test]
    fn test_smtp_timeout_is_independent_of_probe_timeout() {
        let json = r#"{"host":"relay"}"#;
        let smtp: SmtpConfig = serde_json::from_str(json).unwrap();
        assert_eq!(smtp.timeout_secs, 10);
        assert_eq!(SmtpConfig::default().timeout_secs, default_smtp_timeout());
    }

    #[test]
    fn test_smtp_transport_selection() {
        let mut config = SmtpConfig::default();
        assert!(!config.use_authenticated_tls());

        config.username = Some("user".into());
        config.password = Some("secret".into());
        // テスト用リレー宛ては認証なし
        assert!(!config.use_authenticated_tls());

        config.host = "smtp.gmail.com".into();
        config.port = 587;
        assert!(config.use_authenticated_tls());
    }

    #[test]
    fn test_log_api_config_defaults() {
        let config = LogApiConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.log_dir, "/var/log/monitoring");
    }
}
