//! Driftwatch
//!
//! Webターゲットの時刻ずれ・コンテンツを定期監視し、結果の永続化とアラート送信を行う。
//! 監視ログを照会するログAPIも提供する。

#![warn(missing_docs)]

/// REST APIハンドラー
pub mod api;

/// アラート送信
pub mod alert;

/// CLIインターフェース
pub mod cli;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// データベースアクセス
pub mod db;

/// ヘルスチェック監視
pub mod health;

/// ロギング初期化ユーティリティ
pub mod logging;

/// メトリクス出力・パフォーマンスカウンター
pub mod metrics;

/// ログ照会エンジン
pub mod query;

/// axumサーバー
pub mod server;

/// Cooperative shutdown controller
pub mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// ログディレクトリ（watchdog.log / metrics.log）
    pub log_dir: PathBuf,
    /// チェック結果ストア（未設定時は `/api/metrics` が 503）
    pub store: Option<Arc<dyn db::CheckStore>>,
}
