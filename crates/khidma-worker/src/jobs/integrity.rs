//! Metrics integrity validation.
//!
//! Recomputes the presence counts from scratch and compares them with
//! the cached snapshot. Some drift is expected since the snapshot lags
//! by up to one interval; the comparison exists to catch a snapshot
//! task that silently stopped updating. The fresh values replace the
//! cached snapshot either way.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use khidma_core::config::PresenceConfig;
use khidma_core::AppResult;
use khidma_database::repositories::SessionRepository;

use crate::executor::TaskHandler;
use crate::jobs::METRICS_INTEGRITY;
use crate::snapshot::{self, MetricsStore};

#[derive(Debug)]
pub struct MetricsIntegrityTask {
    sessions: SessionRepository,
    store: Arc<MetricsStore>,
    config: PresenceConfig,
}

impl MetricsIntegrityTask {
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
impl TaskHandler for MetricsIntegrityTask {
    fn name(&self) -> &str {
        METRICS_INTEGRITY
    }

    async fn run(&self) -> AppResult<Value> {
        let fresh = snapshot::compute_metrics(&self.sessions, &self.config).await?;
        let cached = self.store.current().await;

        let drift = match &cached {
            Some(cached) => {
                let active_drift = (fresh.active_sessions - cached.active_sessions).abs();
                let user_drift = (fresh.online_users - cached.online_users).abs();
                if cached.computed_at < fresh.computed_at - chrono::Duration::hours(1) {
                    tracing::warn!(
                        cached_at = %cached.computed_at,
                        "cached metrics snapshot is over an hour old; \
                         the snapshot task may not be running"
                    );
                }
                serde_json::json!({
                    "active_sessions": active_drift,
                    "online_users": user_drift,
                })
            }
            None => {
                tracing::warn!("no cached metrics snapshot to validate against");
                Value::Null
            }
        };

        let summary = serde_json::json!({
            "fresh": serde_json::to_value(&fresh)?,
            "had_cached_snapshot": cached.is_some(),
            "drift": drift,
        });
        self.store.replace(fresh).await;
        Ok(summary)
    }
}
