//! ヘルスチェックスケジューラー
//!
//! 一定間隔で基準時刻を取得し、各ターゲットを順番にチェックする。
//!
//! 1サイクルの流れ:
//! 1. 基準時刻の取得（失敗時はフォールバック、または設定によりアラートしてサイクル中断）
//! 2. ターゲットごとに ステータスページ出力 → HTTPプローブ → 判定 → 永続化 → FAIL時アラート
//! 3. サイクル集計（所要時間・成功率）を記録して待機
//!
//! 1ターゲットの失敗は捕捉され、他ターゲットやループを止めない。

use driftwatch_common::config::WatchdogConfig;
use driftwatch_common::error::{WatchError, WatchResult};
use driftwatch_common::types::{CheckResult, Provenance, ReferenceTime, Target, Verdict};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::evaluator::evaluate;
use super::probe::HttpProbe;
use super::reference_time::{acquire_reference_time, Clock, SystemClock, TimeSource};
use super::status_page::StatusPageWriter;
use crate::alert::AlertDispatcher;
use crate::db::CheckStore;
use crate::metrics::{self, PerformanceCounters};
use crate::shutdown::ShutdownController;

/// デフォルトのチェック間隔（秒）
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;

/// デフォルトの最大許容ずれ（秒）
const DEFAULT_MAX_ALLOWED_DRIFT_SECS: i64 = 5;

/// 永続化タイムアウト（秒）
const DEFAULT_PERSIST_TIMEOUT_SECS: u64 = 10;

/// スケジューラーの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// 待機中
    Idle,
    /// チェック実行中
    Checking,
}

/// 1サイクルの実行結果
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// サイクル番号（1始まり）
    pub cycle: u64,
    /// 使用した基準時刻（中断時は None）
    pub reference: Option<ReferenceTime>,
    /// 判定済みのチェック結果
    pub results: Vec<CheckResult>,
    /// 例外で中断したターゲット数
    pub errors: usize,
    /// 永続化に失敗した件数
    pub persist_failures: usize,
    /// 基準時刻の取得失敗でサイクルを中断したか
    pub aborted: bool,
    /// 所要時間（ミリ秒）
    pub duration_ms: u64,
}

impl CycleReport {
    /// PASS件数
    pub fn passes(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.verdict == Verdict::Pass)
            .count()
    }

    /// チェック総数（例外を含む）
    pub fn total(&self) -> usize {
        self.results.len() + self.errors
    }

    /// 成功率（%）。チェックがなければ 0
    pub fn success_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.passes() as f64 * 100.0 / total as f64,
        }
    }
}

struct TargetOutcome {
    result: CheckResult,
    persisted: bool,
}

/// ヘルスチェックスケジューラー
pub struct CheckScheduler {
    targets: Vec<Target>,
    time_source: Arc<dyn TimeSource>,
    clock: Arc<dyn Clock>,
    probe: Arc<dyn HttpProbe>,
    store: Arc<dyn CheckStore>,
    alerts: Arc<AlertDispatcher>,
    status_pages: Option<StatusPageWriter>,
    check_interval: Duration,
    max_allowed_drift: i64,
    allow_time_fallback: bool,
    persist_timeout: Duration,
    state: SchedulerState,
    counters: PerformanceCounters,
}

impl CheckScheduler {
    /// 新しいスケジューラーを作成
    pub fn new(
        targets: Vec<Target>,
        time_source: Arc<dyn TimeSource>,
        probe: Arc<dyn HttpProbe>,
        store: Arc<dyn CheckStore>,
        alerts: Arc<AlertDispatcher>,
    ) -> Self {
        Self {
            targets,
            time_source,
            clock: Arc::new(SystemClock),
            probe,
            store,
            alerts,
            status_pages: None,
            check_interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
            max_allowed_drift: DEFAULT_MAX_ALLOWED_DRIFT_SECS,
            allow_time_fallback: true,
            persist_timeout: Duration::from_secs(DEFAULT_PERSIST_TIMEOUT_SECS),
            state: SchedulerState::Idle,
            counters: PerformanceCounters::default(),
        }
    }

    /// 設定値を適用
    pub fn configure(self, config: &WatchdogConfig) -> Self {
        self.with_interval(config.check_interval_secs)
            .with_max_allowed_drift(config.max_allowed_drift_secs)
            .with_time_fallback(config.allow_time_fallback)
            .with_persist_timeout(Duration::from_secs(config.persist_timeout_secs))
            .with_status_pages(StatusPageWriter::new(
                &config.sites_dir,
                config.timezone.clone(),
            ))
    }

    /// チェック間隔を設定
    pub fn with_interval(mut self, interval_secs: u64) -> Self {
        self.check_interval = Duration::from_secs(interval_secs);
        self
    }

    /// 最大許容ずれを設定
    pub fn with_max_allowed_drift(mut self, max_allowed_drift: i64) -> Self {
        self.max_allowed_drift = max_allowed_drift;
        self
    }

    /// 基準時刻フォールバックの可否を設定
    pub fn with_time_fallback(mut self, allow: bool) -> Self {
        self.allow_time_fallback = allow;
        self
    }

    /// 永続化タイムアウトを設定
    pub fn with_persist_timeout(mut self, timeout: Duration) -> Self {
        self.persist_timeout = timeout;
        self
    }

    /// ローカル時計を差し替え
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// ステータスページ出力を有効化
    pub fn with_status_pages(mut self, writer: StatusPageWriter) -> Self {
        self.status_pages = Some(writer);
        self
    }

    /// 現在の状態
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// パフォーマンスカウンター
    pub fn counters(&self) -> &PerformanceCounters {
        &self.counters
    }

    /// バックグラウンドで監視を開始
    pub fn start(self, shutdown: ShutdownController) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// 監視ループ（シャットダウン要求まで継続）
    pub async fn run(mut self, shutdown: ShutdownController) {
        info!(
            interval_secs = self.check_interval.as_secs(),
            targets = self.targets.len(),
            max_allowed_drift = self.max_allowed_drift,
            "Starting watchdog main loop"
        );

        while !shutdown.is_shutdown_requested() {
            self.run_cycle().await;

            info!(
                interval_secs = self.check_interval.as_secs(),
                "Check cycle completed, sleeping"
            );
            tokio::select! {
                _ = tokio::time::sleep(self.check_interval) => {}
                _ = shutdown.wait() => break,
            }
        }

        info!(
            cycles = self.counters.total_cycles,
            checks = self.counters.total_checks,
            "Watchdog loop stopped"
        );
    }

    /// 1サイクルを実行
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.state = SchedulerState::Checking;
        let started = Instant::now();
        let mut report = CycleReport {
            cycle: self.counters.total_cycles + 1,
            ..Default::default()
        };

        info!(cycle = report.cycle, "Fetching reference time");
        let reference = match acquire_reference_time(
            self.time_source.as_ref(),
            self.clock.as_ref(),
            self.allow_time_fallback,
        )
        .await
        {
            Ok(reference) => reference,
            Err(err) => {
                error!(error = %err, "Error fetching reference time, skipping cycle");
                self.alerts.time_source_failed(&err).await;
                report.aborted = true;
                return self.finish_cycle(report, started);
            }
        };
        if reference.provenance == Provenance::Fallback {
            self.counters.record_time_fallback();
        }
        report.reference = Some(reference);

        let targets = self.targets.clone();
        for target in &targets {
            info!(target = %target, "Checking target");
            match self.check_target(target, &reference).await {
                Ok(outcome) => {
                    self.counters.record_check(&outcome.result);
                    if !outcome.persisted {
                        self.counters.record_persist_failure();
                        report.persist_failures += 1;
                    }
                    report.results.push(outcome.result);
                }
                Err(err) => {
                    error!(target = %target, error = %err, "Error while checking target");
                    self.alerts.check_error(target, &err).await;
                    self.counters.record_error();
                    report.errors += 1;
                }
            }
        }

        self.finish_cycle(report, started)
    }

    fn finish_cycle(&mut self, mut report: CycleReport, started: Instant) -> CycleReport {
        report.duration_ms = started.elapsed().as_millis() as u64;
        self.counters.record_cycle();
        self.state = SchedulerState::Idle;

        let cycle = report.cycle.to_string();
        metrics::emit(
            metrics::CYCLE_DURATION_MS,
            report.duration_ms,
            &[("cycle", &cycle)],
        );
        if !report.aborted {
            metrics::emit(
                metrics::CYCLE_SUCCESS_RATE,
                report.success_rate(),
                &[("cycle", &cycle)],
            );
        }

        info!(
            cycle = report.cycle,
            passes = report.passes(),
            total = report.total(),
            errors = report.errors,
            aborted = report.aborted,
            duration_ms = report.duration_ms,
            avg_response_time_ms = self.counters.average_response_time_ms().unwrap_or(0.0),
            "Cycle summary"
        );
        report
    }

    async fn check_target(
        &self,
        target: &Target,
        reference: &ReferenceTime,
    ) -> WatchResult<TargetOutcome> {
        let local_time = self.clock.now();

        if let Some(pages) = &self.status_pages {
            if let Err(err) = pages.write(target, reference, local_time).await {
                warn!(target = %target, error = %err, "Failed to update status page");
            }
        }

        let response = self.probe.get(&target.url()).await?;
        let result = evaluate(
            target,
            reference,
            local_time,
            &response,
            self.max_allowed_drift,
        );

        info!(
            target = %target,
            verdict = %result.verdict,
            http_status = result.http_status,
            contains_expected = result.body_contains_expected,
            drift_seconds = result.drift_seconds,
            provenance = %result.time_provenance,
            "Check result"
        );

        let target_id = target.id();
        let tags = [
            ("target", target_id.as_str()),
            ("verdict", result.verdict.as_str()),
        ];
        metrics::emit(metrics::CHECK_RESPONSE_TIME_MS, result.response_time_ms, &tags);
        metrics::emit(metrics::CHECK_DRIFT_SECONDS, result.drift_seconds, &tags);

        let persisted = self.persist(&result).await;

        if !result.verdict.is_pass() {
            let causes = result
                .failure_causes()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            warn!(target = %target, causes = %causes, "Validation failed");
            self.alerts
                .validation_failed(&result, &target.expected_text)
                .await;
        }

        Ok(TargetOutcome { result, persisted })
    }

    async fn persist(&self, result: &CheckResult) -> bool {
        let outcome = match tokio::time::timeout(self.persist_timeout, self.store.insert(result))
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(WatchError::StoreUnavailable(format!(
                "insert exceeded {}ms",
                self.persist_timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(id) => {
                debug!(target = %result.target, id, "Persisted check result");
                true
            }
            Err(err) => {
                error!(target = %result.target, error = %err, "Failed to persist check result");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertTransport;
    use crate::db::{CheckSummary, StoredCheck};
    use crate::health::probe::ProbeResponse;
    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn at(secs: i64) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(19800)
            .unwrap()
            .with_ymd_and_hms(2025, 9, 2, 7, 28, 0)
            .unwrap()
            + chrono::Duration::seconds(secs)
    }

    struct FixedTime(WatchResult<DateTime<FixedOffset>>);

    #[async_trait]
    impl TimeSource for FixedTime {
        async fn fetch(&self) -> WatchResult<DateTime<FixedOffset>> {
            match &self.0 {
                Ok(t) => Ok(*t),
                Err(e) => Err(WatchError::TimeSource(e.to_string())),
            }
        }
    }

    struct FixedClock(DateTime<FixedOffset>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<FixedOffset> {
            self.0
        }
    }

    struct ScriptedProbe(HashMap<String, WatchResult<(u16, &'static str)>>);

    #[async_trait]
    impl HttpProbe for ScriptedProbe {
        async fn get(&self, url: &str) -> WatchResult<ProbeResponse> {
            match self.0.get(url) {
                Some(Ok((status, body))) => Ok(ProbeResponse {
                    status: *status,
                    body: body.to_string(),
                    response_time_ms: 7,
                }),
                Some(Err(e)) => Err(WatchError::Http(e.to_string())),
                None => Err(WatchError::Http(format!("unknown url {url}"))),
            }
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<CheckResult>>,
        fail: bool,
    }

    #[async_trait]
    impl CheckStore for MemoryStore {
        async fn insert(&self, result: &CheckResult) -> WatchResult<i64> {
            if self.fail {
                return Err(WatchError::StoreUnavailable("connection refused".into()));
            }
            let mut rows = self.rows.lock().unwrap();
            rows.push(result.clone());
            Ok(rows.len() as i64)
        }

        async fn recent(&self, _limit: usize) -> WatchResult<Vec<StoredCheck>> {
            Ok(Vec::new())
        }

        async fn summary_since(&self, _since: DateTime<Utc>) -> WatchResult<CheckSummary> {
            Ok(CheckSummary::default())
        }
    }

    #[derive(Default)]
    struct Outbox(Mutex<Vec<String>>);

    #[async_trait]
    impl AlertTransport for Outbox {
        async fn deliver(&self, subject: &str, _body: &str) -> WatchResult<()> {
            self.0.lock().unwrap().push(subject.to_string());
            Ok(())
        }
    }

    struct Harness {
        scheduler: CheckScheduler,
        store: Arc<MemoryStore>,
        outbox: Arc<Outbox>,
    }

    fn harness(
        time: WatchResult<DateTime<FixedOffset>>,
        probe: ScriptedProbe,
        store: MemoryStore,
    ) -> Harness {
        let targets = vec![
            Target::parse("web1:80", "Velaris Demo OK").unwrap(),
            Target::parse("web2:80", "Velaris Demo OK").unwrap(),
        ];
        let store = Arc::new(store);
        let outbox = Arc::new(Outbox::default());
        let alerts = Arc::new(AlertDispatcher::new(
            outbox.clone(),
            "[Velaris]",
            Duration::from_secs(1),
        ));
        let scheduler = CheckScheduler::new(
            targets,
            Arc::new(FixedTime(time)),
            Arc::new(probe),
            store.clone(),
            alerts,
        )
        .with_clock(Arc::new(FixedClock(at(3))));
        Harness {
            scheduler,
            store,
            outbox,
        }
    }

    fn healthy_probe() -> ScriptedProbe {
        ScriptedProbe(HashMap::from([
            ("http://web1:80/".to_string(), Ok((200, "Velaris Demo OK"))),
            ("http://web2:80/".to_string(), Ok((200, "Velaris Demo OK"))),
        ]))
    }

    #[tokio::test]
    async fn healthy_cycle_persists_without_alerts() {
        let mut h = harness(Ok(at(0)), healthy_probe(), MemoryStore::default());

        let report = h.scheduler.run_cycle().await;

        assert_eq!(report.passes(), 2);
        assert_eq!(report.success_rate(), 100.0);
        assert_eq!(h.store.rows.lock().unwrap().len(), 2);
        assert!(h.outbox.0.lock().unwrap().is_empty());
        assert_eq!(h.scheduler.state(), SchedulerState::Idle);
        assert_eq!(h.scheduler.counters().total_cycles, 1);
    }

    #[tokio::test]
    async fn one_target_error_does_not_stop_others() {
        let probe = ScriptedProbe(HashMap::from([
            ("http://web1:80/".to_string(), Err(WatchError::Http("dns".into()))),
            ("http://web2:80/".to_string(), Ok((200, "Velaris Demo OK"))),
        ]));
        let mut h = harness(Ok(at(0)), probe, MemoryStore::default());

        let report = h.scheduler.run_cycle().await;

        assert_eq!(report.errors, 1);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].target, "web2:80");
        assert_eq!(report.success_rate(), 50.0);
        assert_eq!(
            *h.outbox.0.lock().unwrap(),
            vec!["[Velaris] Error while checking web1:80".to_string()]
        );
        assert_eq!(h.scheduler.counters().errors, 1);
        assert_eq!(h.scheduler.counters().failures, 1);
    }

    #[tokio::test]
    async fn persistence_failure_is_reported_and_cycle_continues() {
        let store = MemoryStore {
            fail: true,
            ..Default::default()
        };
        let mut h = harness(Ok(at(0)), healthy_probe(), store);

        let report = h.scheduler.run_cycle().await;

        assert_eq!(report.passes(), 2);
        assert_eq!(report.persist_failures, 2);
        assert_eq!(h.scheduler.counters().persist_failures, 2);
        assert!(h.outbox.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn time_source_failure_without_fallback_aborts_cycle() {
        let mut h = harness(
            Err(WatchError::TimeSource("unreachable".into())),
            healthy_probe(),
            MemoryStore::default(),
        );
        h.scheduler = h.scheduler.with_time_fallback(false);

        let report = h.scheduler.run_cycle().await;

        assert!(report.aborted);
        assert!(report.reference.is_none());
        assert_eq!(report.total(), 0);
        assert!(h.store.rows.lock().unwrap().is_empty());
        assert_eq!(
            *h.outbox.0.lock().unwrap(),
            vec!["[Velaris] World time fetch failed".to_string()]
        );
    }

    #[tokio::test]
    async fn time_source_failure_with_fallback_uses_local_clock() {
        let mut h = harness(
            Err(WatchError::TimeSource("unreachable".into())),
            healthy_probe(),
            MemoryStore::default(),
        );

        let report = h.scheduler.run_cycle().await;

        let reference = report.reference.unwrap();
        assert_eq!(reference.provenance, Provenance::Fallback);
        assert!(report.results.iter().all(|r| r.drift_seconds == 0));
        assert_eq!(h.scheduler.counters().time_fallbacks, 1);
        assert!(h.outbox.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let h = harness(Ok(at(0)), healthy_probe(), MemoryStore::default());
        let shutdown = ShutdownController::default();
        let handle = h.scheduler.with_interval(3600).start(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.request_shutdown();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler did not stop")
            .expect("scheduler panicked");
        assert!(!h.store.rows.lock().unwrap().is_empty());
    }
}
