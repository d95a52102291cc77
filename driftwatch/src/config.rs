//! Configuration management via environment variables
//!
//! Provides helper functions for reading environment variables with fallback
//! to deprecated variable names with warning logs.

use driftwatch_common::config::{LogApiConfig, SmtpConfig, WatchdogConfig};
use std::path::PathBuf;

/// Get an environment variable with fallback to a deprecated name
///
/// If the new variable name is set, returns its value.
/// If only the old (deprecated) variable name is set, returns its value
/// and logs a deprecation warning.
///
/// # Arguments
/// * `new_name` - The new environment variable name (preferred)
/// * `old_name` - The deprecated environment variable name (fallback)
///
/// # Returns
/// * `Some(value)` - The environment variable value
/// * `None` - Neither variable is set
///
/// # Example
/// ```
/// use driftwatch::config::get_env_with_fallback;
///
/// let port = get_env_with_fallback("DRIFTWATCH_PORT", "LOG_API_PORT");
/// ```
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        tracing::warn!(
            "Environment variable '{}' is deprecated, use '{}' instead",
            old_name,
            new_name
        );
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback and default value
///
/// Similar to `get_env_with_fallback`, but returns a default value
/// if neither variable is set.
///
/// # Arguments
/// * `new_name` - The new environment variable name (preferred)
/// * `old_name` - The deprecated environment variable name (fallback)
/// * `default` - The default value to return if neither is set
///
/// # Returns
/// The environment variable value or the default
pub fn get_env_with_fallback_or(new_name: &str, old_name: &str, default: &str) -> String {
    get_env_with_fallback(new_name, old_name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable with fallback, parsing to a specific type
///
/// # Arguments
/// * `new_name` - The new environment variable name (preferred)
/// * `old_name` - The deprecated environment variable name (fallback)
/// * `default` - The default value to return if neither is set or parsing fails
///
/// # Returns
/// The parsed environment variable value or the default
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(
    new_name: &str,
    old_name: &str,
    default: T,
) -> T {
    get_env_with_fallback(new_name, old_name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// `true/1/yes/on` を真として解釈する
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// watchdog設定を環境変数から構築する
///
/// | 変数 | 旧名 | 既定値 |
/// |------|------|--------|
/// | `DRIFTWATCH_TARGETS` | `WEB_TARGETS` | `web1:80,web2:80` |
/// | `DRIFTWATCH_EXPECT_TEXT` | `EXPECT_TEXT` | `Velaris Demo OK` |
/// | `DRIFTWATCH_CHECK_INTERVAL_SECS` | `CHECK_INTERVAL_SEC` | `60` |
/// | `DRIFTWATCH_MAX_DRIFT_SECS` | `MAX_ALLOWED_DRIFT_SEC` | `5` |
/// | `DRIFTWATCH_TIMEZONE` | `TARGET_TIMEZONE` | `Asia/Colombo` |
/// | `DRIFTWATCH_TIME_SOURCE_URL` | - | worldtimeapi.org |
/// | `DRIFTWATCH_TIME_FALLBACK` | - | `true` |
/// | `DRIFTWATCH_SITES_DIR` | `SITES_DIR` | `/sites` |
pub fn watchdog_config_from_env() -> WatchdogConfig {
    let defaults = WatchdogConfig::default();
    WatchdogConfig {
        targets: get_env_with_fallback("DRIFTWATCH_TARGETS", "WEB_TARGETS")
            .map(|value| split_list(&value))
            .unwrap_or(defaults.targets),
        expect_text: get_env_with_fallback_or(
            "DRIFTWATCH_EXPECT_TEXT",
            "EXPECT_TEXT",
            &defaults.expect_text,
        ),
        check_interval_secs: get_env_with_fallback_parse(
            "DRIFTWATCH_CHECK_INTERVAL_SECS",
            "CHECK_INTERVAL_SEC",
            defaults.check_interval_secs,
        ),
        max_allowed_drift_secs: get_env_with_fallback_parse(
            "DRIFTWATCH_MAX_DRIFT_SECS",
            "MAX_ALLOWED_DRIFT_SEC",
            defaults.max_allowed_drift_secs,
        ),
        timezone: get_env_with_fallback_or(
            "DRIFTWATCH_TIMEZONE",
            "TARGET_TIMEZONE",
            &defaults.timezone,
        ),
        time_source_url: std::env::var("DRIFTWATCH_TIME_SOURCE_URL").ok(),
        allow_time_fallback: std::env::var("DRIFTWATCH_TIME_FALLBACK")
            .map(|value| parse_flag(&value))
            .unwrap_or(defaults.allow_time_fallback),
        sites_dir: get_env_with_fallback_or(
            "DRIFTWATCH_SITES_DIR",
            "SITES_DIR",
            &defaults.sites_dir,
        ),
        ..defaults
    }
}

/// SMTP設定を環境変数から構築する
///
/// `DRIFTWATCH_SMTP_*`（旧: `SMTP_*`）の HOST / PORT / FROM / TO / USER / PASSWORD を読む。
pub fn smtp_config_from_env() -> SmtpConfig {
    let defaults = SmtpConfig::default();
    SmtpConfig {
        host: get_env_with_fallback_or("DRIFTWATCH_SMTP_HOST", "SMTP_HOST", &defaults.host),
        port: get_env_with_fallback_parse("DRIFTWATCH_SMTP_PORT", "SMTP_PORT", defaults.port),
        from: get_env_with_fallback_or("DRIFTWATCH_SMTP_FROM", "SMTP_FROM", &defaults.from),
        to: get_env_with_fallback_or("DRIFTWATCH_SMTP_TO", "SMTP_TO", &defaults.to),
        username: get_env_with_fallback("DRIFTWATCH_SMTP_USER", "SMTP_USER")
            .filter(|value| !value.is_empty()),
        password: get_env_with_fallback("DRIFTWATCH_SMTP_PASSWORD", "SMTP_PASSWORD")
            .filter(|value| !value.is_empty()),
        ..defaults
    }
}

/// ログAPI設定を環境変数から構築する
pub fn log_api_config_from_env() -> LogApiConfig {
    let defaults = LogApiConfig::default();
    LogApiConfig {
        host: get_env_with_fallback_or("DRIFTWATCH_HOST", "LOG_API_HOST", &defaults.host),
        port: get_env_with_fallback_parse("DRIFTWATCH_PORT", "LOG_API_PORT", defaults.port),
        log_dir: log_dir().display().to_string(),
    }
}

/// ログディレクトリ
///
/// 環境変数 `DRIFTWATCH_LOG_DIR`（旧: `LOG_DIR`）、未設定時は `/var/log/monitoring`。
pub fn log_dir() -> PathBuf {
    PathBuf::from(get_env_with_fallback_or(
        "DRIFTWATCH_LOG_DIR",
        "LOG_DIR",
        &LogApiConfig::default().log_dir,
    ))
}

/// チェック結果データベースのURL
///
/// 環境変数 `DRIFTWATCH_DATABASE_URL`（旧: `DATABASE_URL`）、
/// 未設定時は `sqlite:/var/lib/driftwatch/checks.db`。
pub fn database_url() -> String {
    get_env_with_fallback_or(
        "DRIFTWATCH_DATABASE_URL",
        "DATABASE_URL",
        DEFAULT_DATABASE_URL,
    )
}

/// 既定のデータベースURL
pub const DEFAULT_DATABASE_URL: &str = "sqlite:/var/lib/driftwatch/checks.db";
