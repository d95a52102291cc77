//! ロギング初期化ユーティリティ
//!
//! コンソール出力に加え、ログディレクトリ指定時は2つのファイルへ書き出す。
//!
//! - `watchdog.log`: `YYYY-MM-DD HH:MM:SS,mmm - watchdog - LEVEL - MESSAGE`
//! - `metrics.log`: `YYYY-MM-DD HH:MM:SS,mmm - {json}`（[`METRICS_TARGET`] のイベントのみ）
//!
//! どちらもログAPIの読み取り対象と同じ文法で書かれる。

use anyhow::Context;
use chrono::Local;
use driftwatch_common::log::{format_application_line, format_timestamp, LogLevel};
use std::fmt;
use std::path::Path;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{filter_fn, FilterExt};
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::get_env_with_fallback_or;
use crate::metrics::METRICS_TARGET;
use crate::query::LogKind;

/// アプリケーションログのロガー名
pub const APP_LOGGER: &str = "watchdog";

const DEFAULT_LOG_LEVEL: &str = "info";

fn env_filter() -> EnvFilter {
    let level = get_env_with_fallback_or("DRIFTWATCH_LOG_LEVEL", "LOG_LEVEL", DEFAULT_LOG_LEVEL);
    EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// `watchdog.log` 用フォーマッタ
struct ApplicationLineFormat;

impl<S, N> FormatEvent<S, N> for ApplicationLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut message = String::new();
        ctx.field_format()
            .format_fields(format::Writer::new(&mut message), event)?;
        // tracing の WARN はログ文法上 WARNING として書く
        let level = LogLevel::from_token(event.metadata().level().as_str());
        writeln!(
            writer,
            "{}",
            format_application_line(&Local::now().naive_local(), APP_LOGGER, &level, &message)
        )
    }
}

/// `metrics.log` 用フォーマッタ
struct MetricLineFormat;

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}

impl<S, N> FormatEvent<S, N> for MetricLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        writeln!(
            writer,
            "{} - {}",
            format_timestamp(&Local::now().naive_local()),
            visitor.message
        )
    }
}

fn application_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(ApplicationLineFormat)
        .with_writer(writer)
        .with_filter(filter_fn(|meta| meta.target() != METRICS_TARGET).and(env_filter()))
}

fn metric_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(MetricLineFormat)
        .with_writer(writer)
        .with_filter(filter_fn(|meta| meta.target() == METRICS_TARGET))
}

/// ロギングを初期化する
///
/// `log_dir` を指定すると `watchdog.log` / `metrics.log` にも書き出す。
/// 返り値のガードはプロセス終了まで保持すること（破棄するとバッファが失われる）。
/// 既にグローバルサブスクライバーが設定済みの場合はエラーにしない。
pub fn init(log_dir: Option<&Path>) -> anyhow::Result<Vec<WorkerGuard>> {
    let mut guards = Vec::new();

    let file_layers = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let (app_writer, app_guard) = tracing_appender::non_blocking(
                tracing_appender::rolling::never(dir, LogKind::Watchdog.file_name()),
            );
            let (metric_writer, metric_guard) = tracing_appender::non_blocking(
                tracing_appender::rolling::never(dir, LogKind::Metrics.file_name()),
            );
            guards.push(app_guard);
            guards.push(metric_guard);

            Some(application_layer(app_writer).and_then(metric_layer(metric_writer)))
        }
        None => None,
    };

    // 標準出力は query の結果に使うため、コンソールログは標準エラーへ
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layers)
        .try_init()
        .or_else(|err| {
            use std::error::Error;
            if err
                .source()
                .and_then(|s| s.downcast_ref::<tracing::dispatcher::SetGlobalDefaultError>())
                .is_some()
            {
                return Ok(());
            }
            Err(err)
        })
        .context("Failed to initialize tracing")?;

    Ok(guards)
}
