//! Task executor: dispatches maintenance tasks to registered handlers.
//!
//! Each task carries a re-entrancy guard so a slow run is never
//! overlapped by the next scheduled tick or a manual trigger. A
//! scheduled tick that finds the task running skips quietly; a manual
//! trigger in the same situation is rejected with a conflict so the
//! operator knows a run is already in flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use khidma_core::{AppError, AppResult};

/// One maintenance task.
#[async_trait]
pub trait TaskHandler: Send + Sync + std::fmt::Debug {
    /// Stable task name, used for scheduling and manual triggers.
    fn name(&self) -> &str;

    /// Run the task once. The returned value is a structured summary
    /// of what the run did, logged by the executor.
    async fn run(&self) -> AppResult<Value>;
}

struct RegisteredTask {
    handler: Arc<dyn TaskHandler>,
    running: Arc<AtomicBool>,
}

impl std::fmt::Debug for RegisteredTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTask")
            .field("name", &self.handler.name())
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

/// Clears the running flag when the run ends, even on early return.
struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Dispatches maintenance tasks by name, one run per task at a time.
#[derive(Debug, Default)]
pub struct TaskExecutor {
    tasks: HashMap<String, RegisteredTask>,
}

impl TaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task handler.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        let name = handler.name().to_string();
        tracing::info!(task = %name, "registered maintenance task");
        self.tasks.insert(
            name,
            RegisteredTask {
                handler,
                running: Arc::new(AtomicBool::new(false)),
            },
        );
    }

    /// Registered task names.
    pub fn task_names(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    /// Whether any task is currently running.
    pub fn any_running(&self) -> bool {
        self.tasks
            .values()
            .any(|task| task.running.load(Ordering::SeqCst))
    }

    /// Run a task on its schedule.
    ///
    /// If the previous run is still in flight the tick is skipped with
    /// a warning; the next tick will pick the work up.
    pub async fn run_scheduled(&self, name: &str) {
        let Some(task) = self.tasks.get(name) else {
            tracing::error!(task = %name, "scheduled tick for unregistered task");
            return;
        };

        if task.running.swap(true, Ordering::SeqCst) {
            tracing::warn!(task = %name, "previous run still in flight, skipping tick");
            return;
        }
        let _guard = RunGuard {
            flag: task.running.clone(),
        };

        match task.handler.run().await {
            Ok(summary) => {
                tracing::info!(task = %name, %summary, "maintenance task completed");
            }
            Err(error) => {
                tracing::error!(task = %name, %error, "maintenance task failed");
            }
        }
    }

    /// Trigger a task by hand.
    ///
    /// Unlike the scheduled path, unknown names and in-flight runs are
    /// reported to the caller as errors, and the run's summary is
    /// returned on success.
    pub async fn trigger(&self, name: &str) -> AppResult<Value> {
        let task = self
            .tasks
            .get(name)
            .ok_or_else(|| AppError::unknown_task(format!("No task named '{name}'")))?;

        if task.running.swap(true, Ordering::SeqCst) {
            return Err(AppError::conflict(format!(
                "Task '{name}' is already running"
            )));
        }
        let _guard = RunGuard {
            flag: task.running.clone(),
        };

        tracing::info!(task = %name, "manually triggered maintenance task");
        task.handler.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use khidma_core::ErrorKind;
    use std::time::Duration;

    #[derive(Debug)]
    struct InstantTask;

    #[async_trait]
    impl TaskHandler for InstantTask {
        fn name(&self) -> &str {
            "instant"
        }

        async fn run(&self) -> AppResult<Value> {
            Ok(serde_json::json!({"done": true}))
        }
    }

    #[derive(Debug)]
    struct SlowTask;

    #[async_trait]
    impl TaskHandler for SlowTask {
        fn name(&self) -> &str {
            "slow"
        }

        async fn run(&self) -> AppResult<Value> {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(serde_json::json!({"done": true}))
        }
    }

    #[derive(Debug)]
    struct FailingTask;

    #[async_trait]
    impl TaskHandler for FailingTask {
        fn name(&self) -> &str {
            "failing"
        }

        async fn run(&self) -> AppResult<Value> {
            Err(AppError::internal("boom"))
        }
    }

    fn executor() -> Arc<TaskExecutor> {
        let mut executor = TaskExecutor::new();
        executor.register(Arc::new(InstantTask));
        executor.register(Arc::new(SlowTask));
        executor.register(Arc::new(FailingTask));
        Arc::new(executor)
    }

    #[tokio::test]
    async fn trigger_unknown_task_errors() {
        let executor = executor();
        let error = executor.trigger("nope").await.unwrap_err();
        assert!(error.is_kind(ErrorKind::UnknownTask));
    }

    #[tokio::test]
    async fn trigger_returns_summary() {
        let executor = executor();
        let summary = executor.trigger("instant").await.unwrap();
        assert_eq!(summary["done"], true);
    }

    #[tokio::test]
    async fn concurrent_trigger_conflicts() {
        let executor = executor();
        let first = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.trigger("slow").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let error = executor.trigger("slow").await.unwrap_err();
        assert!(error.is_kind(ErrorKind::Conflict));

        first.await.unwrap().unwrap();
        // The guard clears on completion, so a later trigger succeeds.
        executor.trigger("slow").await.unwrap();
    }

    #[tokio::test]
    async fn guard_clears_after_failure() {
        let executor = executor();
        assert!(executor.trigger("failing").await.is_err());
        assert!(!executor.any_running());
        assert!(executor.trigger("failing").await.is_err());
    }

    #[tokio::test]
    async fn scheduled_run_skips_while_running() {
        let executor = executor();
        let first = {
            let executor = executor.clone();
            tokio::spawn(async move { executor.run_scheduled("slow").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(executor.any_running());

        // Returns immediately instead of waiting on the first run.
        let skipped_at = std::time::Instant::now();
        executor.run_scheduled("slow").await;
        assert!(skipped_at.elapsed() < Duration::from_millis(50));

        first.await.unwrap();
        assert!(!executor.any_running());
    }
}
