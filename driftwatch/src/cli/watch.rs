//! watch サブコマンド
//!
//! 監視ループを起動します。

use crate::alert::{AlertDispatcher, SmtpAlertTransport};
use crate::config;
use crate::db::LazyCheckStore;
use crate::health::{CheckScheduler, ReqwestProbe, WorldTimeSource};
use crate::shutdown::ShutdownController;
use anyhow::Context;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// watch サブコマンドの引数
#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
    /// Run a single check cycle and exit
    #[arg(long, default_value_t = false)]
    pub once: bool,

    /// Override the check interval in seconds
    #[arg(short, long)]
    pub interval: Option<u64>,
}

/// 環境変数の設定から監視スケジューラーを組み立てる
///
/// チェックストアを開けなくてもエラーにしない（結果は破棄され、監視とアラートは継続する）。
pub async fn build_scheduler(args: &WatchArgs) -> Result<CheckScheduler, anyhow::Error> {
    let config = config::watchdog_config_from_env();
    let targets = config
        .parse_targets()
        .context("Invalid target configuration")?;

    let time_source = WorldTimeSource::new(
        config.time_source_url(),
        Duration::from_secs(config.time_source_timeout_secs),
    )?;
    let probe = ReqwestProbe::new(Duration::from_secs(config.probe_timeout_secs))?;

    let store = LazyCheckStore::connect(config::database_url()).await;

    let smtp = config::smtp_config_from_env();
    let alerts = AlertDispatcher::new(
        Arc::new(SmtpAlertTransport::new(&smtp)?),
        smtp.subject_prefix.clone(),
        Duration::from_secs(smtp.timeout_secs),
    );

    let mut scheduler = CheckScheduler::new(
        targets,
        Arc::new(time_source),
        Arc::new(probe),
        Arc::new(store),
        Arc::new(alerts),
    )
    .configure(&config);
    if let Some(interval) = args.interval {
        scheduler = scheduler.with_interval(interval);
    }
    Ok(scheduler)
}

/// watch コマンドを実行
pub async fn execute(args: &WatchArgs) -> Result<(), anyhow::Error> {
    let mut scheduler = build_scheduler(args).await?;

    if args.once {
        let report = scheduler.run_cycle().await;
        info!(
            cycle = report.cycle,
            passes = report.passes(),
            total = report.total(),
            aborted = report.aborted,
            persist_failures = report.persist_failures,
            "Single check cycle finished"
        );
        return Ok(());
    }

    let shutdown = ShutdownController::default();
    shutdown.listen_for_signals();
    scheduler
        .start(shutdown)
        .await
        .context("Watchdog loop terminated unexpectedly")?;
    Ok(())
}
