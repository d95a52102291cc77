//! Driftwatch entry point

use clap::Parser;
use driftwatch::cli::{self, Cli, Commands};
use driftwatch::{config, logging};
use std::path::PathBuf;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ファイルログは監視ループのみ（ログAPIが読む watchdog.log / metrics.log）
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Watch(cli::watch::WatchArgs::default()));
    let log_dir: Option<PathBuf> = match &command {
        Commands::Watch(_) => Some(config::log_dir()),
        _ => None,
    };

    let _guards = match logging::init(log_dir.as_deref()) {
        Ok(guards) => guards,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match command {
        Commands::Watch(args) => cli::watch::execute(&args).await,
        Commands::Serve(args) => cli::serve::execute(&args).await,
        Commands::Query(args) => cli::query::execute(&args),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
