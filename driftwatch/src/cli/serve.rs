//! serve サブコマンド
//!
//! ログAPIサーバーを起動します。

use crate::config;
use crate::db::{migrations::initialize_database, CheckStore, SqliteCheckStore};
use crate::shutdown::ShutdownController;
use crate::{server, AppState};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// serve サブコマンドの引数
///
/// 未指定の値は `DRIFTWATCH_HOST` / `DRIFTWATCH_PORT` / `DRIFTWATCH_LOG_DIR` から補う。
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bind address
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Directory containing watchdog.log and metrics.log
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl ServeArgs {
    /// 待ち受けアドレス
    pub fn bind_addr(&self) -> String {
        let defaults = config::log_api_config_from_env();
        format!(
            "{}:{}",
            self.host.clone().unwrap_or(defaults.host),
            self.port.unwrap_or(defaults.port)
        )
    }

    /// ログディレクトリ
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(config::log_api_config_from_env().log_dir))
    }
}

/// serve コマンドを実行
pub async fn execute(args: &ServeArgs) -> Result<(), anyhow::Error> {
    // ストアが開けなくてもログ閲覧は提供する（/api/metrics のみ 503）
    let store: Option<Arc<dyn CheckStore>> =
        match initialize_database(&config::database_url()).await {
            Ok(pool) => Some(Arc::new(SqliteCheckStore::new(pool))),
            Err(err) => {
                warn!(error = %err, "Check store unavailable, /api/metrics will report 503");
                None
            }
        };

    let state = AppState {
        log_dir: args.log_dir(),
        store,
    };

    let shutdown = ShutdownController::default();
    shutdown.listen_for_signals();
    server::run(state, &args.bind_addr(), shutdown).await?;
    Ok(())
}
