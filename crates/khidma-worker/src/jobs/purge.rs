//! Hard purge of old inactive session rows.
//!
//! Inactive rows are kept for the retention window so recent history
//! stays queryable, then deleted for good. Active rows are never
//! touched here regardless of age.

use async_trait::async_trait;
use serde_json::Value;

use khidma_core::config::PresenceConfig;
use khidma_core::AppResult;
use khidma_database::repositories::SessionRepository;

use crate::executor::TaskHandler;
use crate::jobs::SESSION_PURGE;

#[derive(Debug)]
pub struct SessionPurgeTask {
    sessions: SessionRepository,
    config: PresenceConfig,
}

impl SessionPurgeTask {
    pub fn new(sessions: SessionRepository, config: PresenceConfig) -> Self {
        Self { sessions, config }
    }
}

#[async_trait]
impl TaskHandler for SessionPurgeTask {
    fn name(&self) -> &str {
        SESSION_PURGE
    }

    async fn run(&self) -> AppResult<Value> {
        let purged = self
            .sessions
            .purge_older_than(self.config.session_retention_days)
            .await?;
        tracing::info!(
            purged,
            retention_days = self.config.session_retention_days,
            "session purge complete"
        );
        Ok(serde_json::json!({
            "purged_sessions": purged,
            "retention_days": self.config.session_retention_days,
        }))
    }
}
