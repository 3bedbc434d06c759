//! Periodic presence metrics snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use khidma_core::config::PresenceConfig;
use khidma_core::AppResult;
use khidma_database::repositories::SessionRepository;

use crate::executor::TaskHandler;
use crate::jobs::METRICS_SNAPSHOT;
use crate::snapshot::{self, MetricsStore};

#[derive(Debug)]
pub struct MetricsSnapshotTask {
    sessions: SessionRepository,
    store: Arc<MetricsStore>,
    config: PresenceConfig,
}

impl MetricsSnapshotTask {
    pub fn new(
        sessions: SessionRepository,
        store: Arc<MetricsStore>,
        config: PresenceConfig,
    ) -> Self {
        Self {
            sessions,
            store,
            config,
        }
    }
}

#[async_trait]
impl TaskHandler for MetricsSnapshotTask {
    fn name(&self) -> &str {
        METRICS_SNAPSHOT
    }

    async fn run(&self) -> AppResult<Value> {
        let metrics = snapshot::compute_metrics(&self.sessions, &self.config).await?;
        let summary = serde_json::to_value(&metrics)?;
        self.store.replace(metrics).await;
        Ok(summary)
    }
}
