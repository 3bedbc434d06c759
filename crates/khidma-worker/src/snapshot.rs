//! In-memory presence metrics snapshot.
//!
//! The snapshot task recomputes these counts from the session store on
//! a fixed cadence; readers get the last computed value without
//! touching the database. Counts can therefore lag reality by up to
//! one snapshot interval, which is acceptable for dashboards.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use khidma_core::config::PresenceConfig;
use khidma_core::AppResult;
use khidma_database::repositories::SessionRepository;

/// One computed snapshot of presence counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceMetrics {
    /// When the snapshot was computed.
    pub computed_at: DateTime<Utc>,
    /// Active session rows.
    pub active_sessions: i64,
    /// Inactive session rows awaiting purge.
    pub inactive_sessions: i64,
    /// Distinct users with at least one active session.
    pub online_users: i64,
    /// Active sessions whose heartbeat is past the liveness window.
    pub stale_sessions: i64,
    /// Active sessions per device type.
    pub device_distribution: HashMap<String, i64>,
}

/// Compute a fresh snapshot from the session store.
pub async fn compute_metrics(
    sessions: &SessionRepository,
    config: &PresenceConfig,
) -> AppResult<PresenceMetrics> {
    let now = Utc::now();
    let cutoff = now - Duration::minutes(config.liveness_window_minutes);

    let active_sessions = sessions.count_active().await?;
    let inactive_sessions = sessions.count_inactive().await?;
    let online_users = sessions.count_distinct_active_users().await?;
    let stale_sessions = sessions.count_stale(cutoff).await?;
    let device_distribution = sessions
        .device_distribution()
        .await?
        .into_iter()
        .map(|(device, count)| (device.to_string(), count))
        .collect();

    Ok(PresenceMetrics {
        computed_at: now,
        active_sessions,
        inactive_sessions,
        online_users,
        stale_sessions,
        device_distribution,
    })
}

/// Shared holder for the latest snapshot.
#[derive(Debug, Default)]
pub struct MetricsStore {
    current: RwLock<Option<PresenceMetrics>>,
}

impl MetricsStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The most recent snapshot, if one has been computed.
    pub async fn current(&self) -> Option<PresenceMetrics> {
        self.current.read().await.clone()
    }

    /// Replace the stored snapshot.
    pub async fn replace(&self, metrics: PresenceMetrics) {
        *self.current.write().await = Some(metrics);
    }

    /// Recompute from storage right now, bypassing the snapshot
    /// cadence, and return the fresh values.
    pub async fn force_recompute(
        &self,
        sessions: &SessionRepository,
        config: &PresenceConfig,
    ) -> AppResult<PresenceMetrics> {
        let metrics = compute_metrics(sessions, config).await?;
        self.replace(metrics.clone()).await;
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(active: i64) -> PresenceMetrics {
        PresenceMetrics {
            computed_at: Utc::now(),
            active_sessions: active,
            inactive_sessions: 0,
            online_users: active,
            stale_sessions: 0,
            device_distribution: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn store_starts_empty() {
        let store = MetricsStore::new();
        assert!(store.current().await.is_none());
    }

    #[tokio::test]
    async fn replace_overwrites_previous_snapshot() {
        let store = MetricsStore::new();
        store.replace(sample(3)).await;
        store.replace(sample(7)).await;
        let current = store.current().await.unwrap();
        assert_eq!(current.active_sessions, 7);
    }
}
