//! Presence health check.
//!
//! Surfaces drift between what the users table claims and what the
//! session store supports: users shown as present with no active
//! session, and active sessions past the liveness window. The check
//! only reports; repair is a separate task an operator triggers
//! deliberately after looking at the numbers.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;

use khidma_core::config::PresenceConfig;
use khidma_core::AppResult;
use khidma_database::repositories::{SessionRepository, UserRepository};
use khidma_database::DatabasePool;

use crate::executor::TaskHandler;
use crate::jobs::HEALTH_CHECK;

#[derive(Debug)]
pub struct HealthCheckTask {
    db: DatabasePool,
    sessions: SessionRepository,
    users: UserRepository,
    config: PresenceConfig,
}

impl HealthCheckTask {
    pub fn new(
        db: DatabasePool,
        sessions: SessionRepository,
        users: UserRepository,
        config: PresenceConfig,
    ) -> Self {
        Self {
            db,
            sessions,
            users,
            config,
        }
    }
}

#[async_trait]
impl TaskHandler for HealthCheckTask {
    fn name(&self) -> &str {
        HEALTH_CHECK
    }

    async fn run(&self) -> AppResult<Value> {
        let database_ok = self.db.health_check().await?;

        let cutoff = Utc::now() - Duration::minutes(self.config.liveness_window_minutes);
        let stale_sessions = self.sessions.count_stale(cutoff).await?;
        let inconsistent_users = self.users.find_present_without_sessions().await?;

        if !inconsistent_users.is_empty() {
            tracing::warn!(
                count = inconsistent_users.len(),
                "users shown present without any active session; \
                 run presence_repair to resynchronize"
            );
        }
        if stale_sessions > 0 {
            tracing::warn!(stale_sessions, "active sessions past the liveness window");
        }

        let healthy = database_ok && inconsistent_users.is_empty();
        Ok(serde_json::json!({
            "healthy": healthy,
            "database_ok": database_ok,
            "stale_sessions": stale_sessions,
            "inconsistent_users": inconsistent_users.len(),
        }))
    }
}
