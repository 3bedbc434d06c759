//! Cron scheduler for the periodic maintenance tasks.
//!
//! Cadences come from [`WorkerConfig`]; the repair task is registered
//! with the executor but never given a schedule, it only runs when
//! triggered by hand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use khidma_core::config::WorkerConfig;
use khidma_core::{AppError, AppResult};

use crate::executor::TaskExecutor;
use crate::jobs;

/// How long `stop` waits for in-flight task runs to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Cron expression firing every `minutes` minutes.
fn every_minutes(minutes: u32) -> String {
    format!("0 */{minutes} * * * *")
}

/// Cron expression firing every `hours` hours, on the hour.
fn every_hours(hours: u32) -> String {
    format!("0 0 */{hours} * * *")
}

/// Cron expression firing every `days` days, at 04:00.
fn every_days(days: u32) -> String {
    format!("0 0 4 */{days} * *")
}

/// Drives scheduled maintenance through the task executor.
pub struct MaintenanceScheduler {
    scheduler: JobScheduler,
    executor: Arc<TaskExecutor>,
    config: WorkerConfig,
    started: AtomicBool,
}

impl std::fmt::Debug for MaintenanceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceScheduler")
            .field("started", &self.started.load(Ordering::SeqCst))
            .finish()
    }
}

impl MaintenanceScheduler {
    pub async fn new(executor: Arc<TaskExecutor>, config: WorkerConfig) -> AppResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self {
            scheduler,
            executor,
            config,
            started: AtomicBool::new(false),
        })
    }

    /// Register the cron schedules for every periodic task.
    pub async fn register_default_tasks(&self) -> AppResult<()> {
        self.register(
            jobs::SESSION_SWEEP,
            every_minutes(self.config.sweep_interval_minutes),
        )
        .await?;
        self.register(
            jobs::METRICS_SNAPSHOT,
            every_minutes(self.config.metrics_interval_minutes),
        )
        .await?;
        self.register(
            jobs::SESSION_PURGE,
            every_hours(self.config.purge_interval_hours),
        )
        .await?;
        self.register(
            jobs::HEALTH_CHECK,
            every_minutes(self.config.health_interval_minutes),
        )
        .await?;
        self.register(
            jobs::METRICS_INTEGRITY,
            every_days(self.config.integrity_interval_days),
        )
        .await?;

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    async fn register(&self, name: &'static str, schedule: String) -> AppResult<()> {
        let executor = Arc::clone(&self.executor);
        let job = CronJob::new_async(schedule.as_str(), move |_uuid, _lock| {
            let executor = Arc::clone(&executor);
            Box::pin(async move {
                executor.run_scheduled(name).await;
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create {name} schedule: {e}")))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add {name} schedule: {e}")))?;

        tracing::info!(task = %name, %schedule, "registered schedule");
        Ok(())
    }

    /// Start the scheduler. Idempotent: a second call warns and does
    /// nothing.
    pub async fn start(&self) -> AppResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("scheduler already started");
            return Ok(());
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        tracing::info!("Maintenance scheduler started");
        Ok(())
    }

    /// Stop scheduling and wait for in-flight runs to finish.
    ///
    /// Waiting is bounded; a task still running after the drain
    /// timeout is abandoned with an error logged.
    pub async fn stop(&self) -> AppResult<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;
        self.started.store(false, Ordering::SeqCst);

        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        while self.executor.any_running() {
            if tokio::time::Instant::now() >= deadline {
                tracing::error!("task still running after drain timeout, abandoning");
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        tracing::info!("Maintenance scheduler stopped");
        Ok(())
    }

    /// Run a task now, outside its schedule.
    pub async fn trigger(&self, name: &str) -> AppResult<Value> {
        self.executor.trigger(name).await
    }
}
