//! Khidma presence server.
//!
//! Wires the session store, the real-time presence engine, and the
//! maintenance scheduler together and runs until interrupted.

use std::sync::Arc;

use async_trait::async_trait;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use khidma_core::config::AppConfig;
use khidma_core::AppError;
use khidma_database::repositories::{SessionRepository, UserRepository};
use khidma_database::{migration, DatabasePool};
use khidma_realtime::observer::StaticObserverLookup;
use khidma_realtime::{ConnectionRegistry, PresenceBroadcaster, PresenceGateway};
use khidma_worker::jobs::{
    HealthCheckTask, MetricsIntegrityTask, MetricsSnapshotTask, PresenceRepairTask,
    SessionPurgeTask, SessionSweepTask,
};
use khidma_worker::{MaintenanceScheduler, MetricsStore, PresenceNotifier, TaskExecutor};

/// Routes offline transitions decided by maintenance tasks back
/// through the broadcaster so connected observers hear about them.
#[derive(Debug)]
struct BroadcastNotifier {
    broadcaster: PresenceBroadcaster,
}

#[async_trait]
impl PresenceNotifier for BroadcastNotifier {
    async fn user_went_offline(&self, user_id: Uuid) {
        self.broadcaster.broadcast_presence(user_id).await;
    }
}

#[tokio::main]
async fn main() {
    let env = std::env::var("KHIDMA_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Khidma presence server v{}", env!("CARGO_PKG_VERSION"));

    // ── Database connection + migrations ─────────────────────────
    let db = DatabasePool::connect(&config.database).await?;
    migration::run_migrations(db.pool()).await?;

    let sessions = SessionRepository::new(db.pool().clone());
    let users = UserRepository::new(db.pool().clone());

    // ── Real-time presence engine ────────────────────────────────
    // The marketplace's relationship service supplies the observer
    // lookup in a full deployment; standalone, nobody observes anyone.
    let observers = Arc::new(StaticObserverLookup::default());

    let registry = Arc::new(ConnectionRegistry::new());
    let broadcaster = PresenceBroadcaster::new(
        Arc::clone(&registry),
        sessions.clone(),
        users.clone(),
        observers,
        config.presence.clone(),
    );
    let gateway = PresenceGateway::new(
        Arc::clone(&registry),
        broadcaster.clone(),
        sessions.clone(),
        users.clone(),
        config.realtime.clone(),
    );

    // ── Maintenance scheduler ────────────────────────────────────
    let metrics_store = MetricsStore::new();
    let notifier: Arc<dyn PresenceNotifier> = Arc::new(BroadcastNotifier {
        broadcaster: broadcaster.clone(),
    });

    let mut executor = TaskExecutor::new();
    executor.register(Arc::new(SessionSweepTask::new(
        sessions.clone(),
        users.clone(),
        Arc::clone(&notifier),
        config.presence.clone(),
    )));
    executor.register(Arc::new(MetricsSnapshotTask::new(
        sessions.clone(),
        Arc::clone(&metrics_store),
        config.presence.clone(),
    )));
    executor.register(Arc::new(SessionPurgeTask::new(
        sessions.clone(),
        config.presence.clone(),
    )));
    executor.register(Arc::new(HealthCheckTask::new(
        db.clone(),
        sessions.clone(),
        users.clone(),
        config.presence.clone(),
    )));
    executor.register(Arc::new(MetricsIntegrityTask::new(
        sessions.clone(),
        Arc::clone(&metrics_store),
        config.presence.clone(),
    )));
    executor.register(Arc::new(PresenceRepairTask::new(
        users.clone(),
        Arc::clone(&notifier),
    )));
    let executor = Arc::new(executor);

    let scheduler = MaintenanceScheduler::new(Arc::clone(&executor), config.worker.clone()).await?;
    if config.worker.enabled {
        scheduler.register_default_tasks().await?;
        scheduler.start().await?;
    } else {
        tracing::warn!("maintenance scheduler disabled by configuration");
    }

    tracing::info!("Khidma presence server ready");

    // ── Wait for shutdown signal ─────────────────────────────────
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::internal(format!("Failed to listen for shutdown signal: {e}")))?;
    tracing::info!("Shutdown signal received");

    // Stop scheduling first so no new maintenance runs start, then
    // detach every live connection so sessions close cleanly.
    scheduler.stop().await?;
    for handle in registry.all_connections() {
        if let Err(error) = gateway.detach(handle.id).await {
            tracing::error!(connection_id = %handle.id, %error, "detach during shutdown failed");
        }
    }
    db.close().await;

    tracing::info!("Khidma presence server stopped");
    Ok(())
}
