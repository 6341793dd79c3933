use crate::domain::model::Source;
use crate::domain::ports::{CronEvaluator, IngestionRunner, SourceStore, SourceUpdate};
use crate::utils::error::{IngestError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    /// 連續失敗達此次數即自動停用來源
    pub max_consecutive_failures: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Succeeded {
        pages: usize,
        records: usize,
        elapsed: Duration,
        max_pages_reached: bool,
    },
    Failed {
        error: String,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub due: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub disabled: usize,
}

/// 依執行結果推進來源狀態（值進值出，不共享可變狀態）
pub fn apply_outcome(
    mut source: Source,
    outcome: &RunOutcome,
    now: DateTime<Utc>,
    next_run_at: Option<DateTime<Utc>>,
    max_consecutive_failures: u32,
) -> Source {
    source.state.last_run_at = Some(now);
    source.state.total_runs_count += 1;

    match outcome {
        RunOutcome::Succeeded { .. } => {
            source.state.consecutive_failures = 0;
            source.state.last_successful_run_at = Some(now);
        }
        RunOutcome::Failed { .. } => {
            source.state.consecutive_failures += 1;
            if source.state.consecutive_failures >= max_consecutive_failures {
                source.enabled = false;
            }
        }
    }

    source.state.next_run_at = next_run_at;
    source
}

/// 固定週期檢查到期來源，逐一（循序）執行並寫回排程狀態
pub struct IngestionScheduler {
    store: Arc<dyn SourceStore>,
    runner: Arc<dyn IngestionRunner>,
    cron: Arc<dyn CronEvaluator>,
    config: SchedulerConfig,
}

impl IngestionScheduler {
    pub fn new(
        store: Arc<dyn SourceStore>,
        runner: Arc<dyn IngestionRunner>,
        cron: Arc<dyn CronEvaluator>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            runner,
            cron,
            config,
        }
    }

    /// 背景迴圈，直到 `shutdown` 被取消；取消也會中止正在進行的抓取
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(
            tick_interval_secs = self.config.tick_interval.as_secs(),
            max_consecutive_failures = self.config.max_consecutive_failures,
            "🚀 Ingestion scheduler started"
        );

        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("🛑 Ingestion scheduler stopping");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = self.tick_with_cancel(Utc::now(), &shutdown).await {
                        tracing::error!(error = %e, "❌ Scheduler tick failed");
                    }
                }
            }
        }

        Ok(())
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickSummary> {
        self.tick_with_cancel(now, &CancellationToken::new()).await
    }

    pub async fn tick_with_cancel(
        &self,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<TickSummary> {
        let sources = self.store.load_sources().await?;
        let due: Vec<Source> = sources.into_iter().filter(|s| s.is_due(now)).collect();

        let mut summary = TickSummary {
            due: due.len(),
            ..Default::default()
        };
        tracing::info!(due = summary.due, "⏰ Scheduler tick");

        let mut updates = Vec::with_capacity(due.len());
        for source in due {
            if cancel.is_cancelled() {
                break;
            }

            let (updated, outcome) = self.run_source(source, now, cancel).await;
            if outcome.is_success() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            if !updated.enabled {
                summary.disabled += 1;
            }
            updates.push(SourceUpdate::from_source(&updated));
        }

        if !updates.is_empty() {
            self.store.save_updates(&updates).await?;
        }

        tracing::info!(
            due = summary.due,
            succeeded = summary.succeeded,
            failed = summary.failed,
            disabled = summary.disabled,
            "⏰ Scheduler tick finished"
        );

        Ok(summary)
    }

    /// 立即執行指定來源（手動觸發），不論是否到期
    pub async fn trigger(&self, source_id: &str, now: DateTime<Utc>) -> Result<(Source, RunOutcome)> {
        let source = self
            .store
            .load_sources()
            .await?
            .into_iter()
            .find(|s| s.id == source_id)
            .ok_or_else(|| IngestError::config(format!("Unknown source id: {}", source_id)))?;

        let (updated, outcome) = self
            .run_source(source, now, &CancellationToken::new())
            .await;
        self.store
            .save_updates(&[SourceUpdate::from_source(&updated)])
            .await?;

        Ok((updated, outcome))
    }

    pub async fn run_source(
        &self,
        source: Source,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> (Source, RunOutcome) {
        // 沒有排程的來源只會被手動觸發，不計算下次時間
        let schedule = source
            .schedule
            .clone()
            .filter(|expr| !expr.trim().is_empty());

        let validation = match &schedule {
            Some(expr) => self.cron.validate(expr),
            None => Ok(()),
        };
        let outcome = match validation {
            Ok(()) => self.execute(&source, cancel).await,
            Err(e) => RunOutcome::Failed {
                error: e.to_string(),
            },
        };

        // 以 tick 時間與實際完成時間較晚者為基準，確保下次時間不在過去
        let reference = std::cmp::max(now, Utc::now());
        let next_run_at = match schedule.as_deref().map(|expr| self.cron.next_after(expr, reference)) {
            Some(Ok(next)) => Some(next),
            Some(Err(e)) => {
                tracing::error!(source_id = %source.id, error = %e, "❌ Cannot compute next run");
                None
            }
            None => None,
        };

        let updated = apply_outcome(
            source,
            &outcome,
            now,
            next_run_at,
            self.config.max_consecutive_failures,
        );

        match &outcome {
            RunOutcome::Succeeded {
                pages,
                records,
                elapsed,
                max_pages_reached,
            } => tracing::info!(
                source_id = %updated.id,
                pages = *pages,
                records = *records,
                elapsed_ms = elapsed.as_millis() as u64,
                max_pages_reached = *max_pages_reached,
                success = true,
                consecutive_failures = updated.state.consecutive_failures,
                next_run_at = ?updated.state.next_run_at,
                "✅ Source run succeeded"
            ),
            RunOutcome::Failed { error } => tracing::warn!(
                source_id = %updated.id,
                success = false,
                error = %error,
                consecutive_failures = updated.state.consecutive_failures,
                next_run_at = ?updated.state.next_run_at,
                "❌ Source run failed"
            ),
        }

        if !updated.enabled {
            tracing::warn!(
                source_id = %updated.id,
                consecutive_failures = updated.state.consecutive_failures,
                "🔶 Source auto-disabled after too many consecutive failures"
            );
        }

        (updated, outcome)
    }

    /// 在獨立 task 中執行，panic 只會讓這個來源失敗
    async fn execute(&self, source: &Source, cancel: &CancellationToken) -> RunOutcome {
        let runner = self.runner.clone();
        let task_source = source.clone();
        let token = cancel.child_token();

        let handle = tokio::spawn(async move { runner.run(&task_source, &token).await });

        match handle.await {
            Ok(Ok(result)) if result.success => RunOutcome::Succeeded {
                pages: result.total_pages,
                records: result.total_records,
                elapsed: result.total_elapsed,
                max_pages_reached: result.max_pages_reached,
            },
            Ok(Ok(result)) => RunOutcome::Failed {
                error: result
                    .error_message
                    .unwrap_or_else(|| "ingestion reported failure".to_string()),
            },
            Ok(Err(e)) => RunOutcome::Failed {
                error: e.to_string(),
            },
            Err(join_error) => RunOutcome::Failed {
                error: format!("ingestion task aborted: {}", join_error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::MemorySourceStore;
    use crate::core::cron::StandardCron;
    use crate::domain::result::PaginatedFetchResult;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        Error,
        Panic,
    }

    struct MockRunner {
        behaviors: HashMap<String, Behavior>,
        calls: Mutex<Vec<String>>,
    }

    impl MockRunner {
        fn new(behaviors: &[(&str, Behavior)]) -> Arc<Self> {
            Arc::new(Self {
                behaviors: behaviors
                    .iter()
                    .map(|(id, b)| (id.to_string(), *b))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn fetch_result(success: bool) -> PaginatedFetchResult {
        PaginatedFetchResult {
            pages: Vec::new(),
            total_pages: if success { 2 } else { 0 },
            total_records: if success { 20 } else { 0 },
            success,
            error_message: (!success).then(|| "Transport error (HTTP 500): boom".to_string()),
            total_elapsed: Duration::from_millis(5),
            page_elapsed: Vec::new(),
            max_pages_reached: false,
        }
    }

    #[async_trait]
    impl IngestionRunner for MockRunner {
        async fn run(&self, source: &Source, _cancel: &CancellationToken) -> Result<PaginatedFetchResult> {
            self.calls.lock().unwrap().push(source.id.clone());
            match self.behaviors.get(&source.id).copied().unwrap_or(Behavior::Succeed) {
                Behavior::Succeed => Ok(fetch_result(true)),
                Behavior::Fail => Ok(fetch_result(false)),
                Behavior::Error => Err(IngestError::config("missing cursor_path")),
                Behavior::Panic => panic!("source {} exploded", source.id),
            }
        }
    }

    fn scheduled_source(id: &str) -> Source {
        let mut source = Source::new(id, "REST", format!("https://api.example.com/{}", id));
        source.schedule = Some("* * * * *".to_string());
        source
    }

    fn scheduler(store: Arc<MemorySourceStore>, runner: Arc<MockRunner>) -> IngestionScheduler {
        IngestionScheduler::new(store, runner, Arc::new(StandardCron), SchedulerConfig::default())
    }

    #[test]
    fn test_apply_outcome_success_resets_failures() {
        let now = Utc::now();
        let mut source = scheduled_source("a");
        source.state.consecutive_failures = 3;
        source.state.total_runs_count = 7;

        let outcome = RunOutcome::Succeeded {
            pages: 1,
            records: 1,
            elapsed: Duration::ZERO,
            max_pages_reached: false,
        };
        let next = now + ChronoDuration::minutes(1);
        let updated = apply_outcome(source, &outcome, now, Some(next), 5);

        assert_eq!(updated.state.consecutive_failures, 0);
        assert_eq!(updated.state.total_runs_count, 8);
        assert_eq!(updated.state.last_run_at, Some(now));
        assert_eq!(updated.state.last_successful_run_at, Some(now));
        assert_eq!(updated.state.next_run_at, Some(next));
        assert!(updated.enabled);
    }

    #[test]
    fn test_apply_outcome_disables_at_threshold() {
        let now = Utc::now();
        let mut source = scheduled_source("a");
        source.state.consecutive_failures = 4;
        let outcome = RunOutcome::Failed {
            error: "boom".to_string(),
        };

        let updated = apply_outcome(source, &outcome, now, None, 5);
        assert_eq!(updated.state.consecutive_failures, 5);
        assert!(!updated.enabled);
        assert_eq!(updated.state.last_successful_run_at, None);
    }

    #[tokio::test]
    async fn test_tick_runs_due_source_and_reschedules() {
        let store = Arc::new(MemorySourceStore::new(vec![scheduled_source("a")]));
        let runner = MockRunner::new(&[]);
        let scheduler = scheduler(store.clone(), runner.clone());

        let now = Utc::now();
        let summary = scheduler.tick(now).await.unwrap();

        assert_eq!(summary, TickSummary { due: 1, succeeded: 1, failed: 0, disabled: 0 });
        let source = store.get("a").unwrap();
        assert_eq!(source.state.last_run_at, Some(now));
        assert_eq!(source.state.total_runs_count, 1);
        assert!(source.state.next_run_at.unwrap() > now);
        assert!(source.state.last_successful_run_at.is_some());
    }

    #[tokio::test]
    async fn test_sources_not_due_are_skipped() {
        let now = Utc::now();
        let mut future = scheduled_source("future");
        future.state.next_run_at = Some(now + ChronoDuration::hours(1));
        let mut disabled = scheduled_source("disabled");
        disabled.enabled = false;
        let mut unscheduled = scheduled_source("unscheduled");
        unscheduled.schedule = None;

        let store = Arc::new(MemorySourceStore::new(vec![future, disabled, unscheduled]));
        let runner = MockRunner::new(&[]);
        let summary = scheduler(store.clone(), runner.clone()).tick(now).await.unwrap();

        assert_eq!(summary.due, 0);
        assert!(runner.calls().is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_auto_disable_after_max_consecutive_failures() {
        let store = Arc::new(MemorySourceStore::new(vec![scheduled_source("flaky")]));
        let runner = MockRunner::new(&[("flaky", Behavior::Fail)]);
        let scheduler = scheduler(store.clone(), runner.clone());

        let base = Utc::now();
        for hour in 0..DEFAULT_MAX_CONSECUTIVE_FAILURES as i64 {
            let summary = scheduler.tick(base + ChronoDuration::hours(hour)).await.unwrap();
            assert_eq!(summary.failed, 1);
        }

        let source = store.get("flaky").unwrap();
        assert!(!source.enabled);
        assert_eq!(source.state.consecutive_failures, DEFAULT_MAX_CONSECUTIVE_FAILURES);
        assert_eq!(source.state.total_runs_count, DEFAULT_MAX_CONSECUTIVE_FAILURES as u64);

        // 停用後不再執行
        let summary = scheduler.tick(base + ChronoDuration::hours(10)).await.unwrap();
        assert_eq!(summary.due, 0);
        assert_eq!(runner.calls().len(), DEFAULT_MAX_CONSECUTIVE_FAILURES as usize);
    }

    #[tokio::test]
    async fn test_failure_in_one_source_does_not_block_others() {
        let store = Arc::new(MemorySourceStore::new(vec![
            scheduled_source("a"),
            scheduled_source("b"),
            scheduled_source("c"),
        ]));
        let runner = MockRunner::new(&[("a", Behavior::Panic), ("b", Behavior::Error)]);
        let scheduler = scheduler(store.clone(), runner.clone());

        let now = Utc::now();
        let summary = scheduler.tick(now).await.unwrap();

        assert_eq!(summary.due, 3);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(runner.calls().len(), 3);

        let a = store.get("a").unwrap();
        assert_eq!(a.state.consecutive_failures, 1);
        assert!(a.state.next_run_at.unwrap() > now);

        let b = store.get("b").unwrap();
        assert_eq!(b.state.consecutive_failures, 1);

        let c = store.get("c").unwrap();
        assert_eq!(c.state.consecutive_failures, 0);
        assert!(c.state.next_run_at.unwrap() > now);
        assert_eq!(store.save_count(), 1, "all updates of a tick are saved together");
    }

    #[tokio::test]
    async fn test_invalid_cron_counts_as_failure_without_running() {
        let mut source = scheduled_source("bad");
        source.schedule = Some("every five minutes".to_string());
        let store = Arc::new(MemorySourceStore::new(vec![source]));
        let runner = MockRunner::new(&[]);

        let summary = scheduler(store.clone(), runner.clone()).tick(Utc::now()).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert!(runner.calls().is_empty());
        let source = store.get("bad").unwrap();
        assert_eq!(source.state.consecutive_failures, 1);
        assert_eq!(source.state.next_run_at, None);
    }

    #[tokio::test]
    async fn test_trigger_runs_source_that_is_not_due() {
        let now = Utc::now();
        let mut source = scheduled_source("manual");
        source.state.next_run_at = Some(now + ChronoDuration::days(1));
        let store = Arc::new(MemorySourceStore::new(vec![source]));
        let runner = MockRunner::new(&[]);
        let scheduler = scheduler(store.clone(), runner.clone());

        let (updated, outcome) = scheduler.trigger("manual", now).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(updated.state.total_runs_count, 1);
        assert_eq!(runner.calls(), vec!["manual".to_string()]);

        assert!(scheduler.trigger("missing", now).await.is_err());
    }

    #[tokio::test]
    async fn test_trigger_unscheduled_source_has_no_next_run() {
        let store = Arc::new(MemorySourceStore::new(vec![Source::new(
            "adhoc",
            "REST",
            "https://api.example.com/adhoc",
        )]));
        let runner = MockRunner::new(&[]);

        let (updated, outcome) = scheduler(store.clone(), runner.clone())
            .trigger("adhoc", Utc::now())
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(updated.state.next_run_at, None);
        assert_eq!(runner.calls(), vec!["adhoc".to_string()]);
    }

    #[tokio::test]
    async fn test_run_loop_stops_on_shutdown() {
        let store = Arc::new(MemorySourceStore::new(vec![scheduled_source("a")]));
        let runner = MockRunner::new(&[]);
        let scheduler = IngestionScheduler::new(
            store,
            runner.clone(),
            Arc::new(StandardCron),
            SchedulerConfig {
                tick_interval: Duration::from_millis(10),
                max_consecutive_failures: 5,
            },
        );

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        tokio::time::timeout(Duration::from_secs(5), scheduler.run(shutdown))
            .await
            .expect("scheduler should stop after shutdown")
            .unwrap();

        // 第一次 tick 立即觸發
        assert!(!runner.calls().is_empty());
    }
}
