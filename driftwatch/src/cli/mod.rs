//! CLI module for driftwatch
//!
//! Provides the command-line interface for the watchdog loop, the log API
//! server and one-shot log queries.

/// query サブコマンド
pub mod query;
/// serve サブコマンド
pub mod serve;
/// watch サブコマンド
pub mod watch;

use clap::{Parser, Subcommand};

/// Driftwatch - clock drift and content watchdog for web targets
#[derive(Parser, Debug)]
#[command(name = "driftwatch")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    DRIFTWATCH_TARGETS              Targets as host:port list (default: web1:80,web2:80)
    DRIFTWATCH_EXPECT_TEXT          Expected page content (default: Velaris Demo OK)
    DRIFTWATCH_CHECK_INTERVAL_SECS  Seconds between cycles (default: 60)
    DRIFTWATCH_MAX_DRIFT_SECS       Allowed drift in seconds (default: 5)
    DRIFTWATCH_TIMEZONE             Reference timezone (default: Asia/Colombo)
    DRIFTWATCH_TIME_SOURCE_URL      Reference time API URL (default: worldtimeapi.org)
    DRIFTWATCH_TIME_FALLBACK        Fall back to the local clock (default: true)
    DRIFTWATCH_SITES_DIR            Status page directory (default: /sites)
    DRIFTWATCH_SMTP_HOST            SMTP relay (default: mailhog)
    DRIFTWATCH_SMTP_PORT            SMTP port (default: 1025)
    DRIFTWATCH_SMTP_FROM            Alert sender
    DRIFTWATCH_SMTP_TO              Alert recipient
    DRIFTWATCH_SMTP_USER            SMTP username
    DRIFTWATCH_SMTP_PASSWORD        SMTP password
    DRIFTWATCH_DATABASE_URL         Check store URL (default: sqlite:/var/lib/driftwatch/checks.db)
    DRIFTWATCH_LOG_DIR              Log directory (default: /var/log/monitoring)
    DRIFTWATCH_LOG_LEVEL            Log level (default: info)
    DRIFTWATCH_HOST                 Log API bind address (default: 0.0.0.0)
    DRIFTWATCH_PORT                 Log API port (default: 5000)

Legacy names (WEB_TARGETS, EXPECT_TEXT, CHECK_INTERVAL_SEC, SMTP_HOST, ...) are
still accepted with a deprecation warning.
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the watchdog check loop
    Watch(watch::WatchArgs),
    /// Start the log API server
    Serve(serve::ServeArgs),
    /// Query a log file and print the result
    Query(query::QueryArgs),
}
