//! Stale-session sweep.
//!
//! Sessions whose heartbeat is older than the liveness window belong
//! to connections that died without a clean disconnect (process crash,
//! network partition). The sweep deactivates them in one atomic
//! statement and transitions users whose last session was swept to
//! offline, mirroring what a clean disconnect would have done.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;

use khidma_core::config::PresenceConfig;
use khidma_core::AppResult;
use khidma_database::repositories::{SessionRepository, UserRepository};

use crate::executor::TaskHandler;
use crate::jobs::SESSION_SWEEP;
use crate::notifier::PresenceNotifier;

#[derive(Debug)]
pub struct SessionSweepTask {
    sessions: SessionRepository,
    users: UserRepository,
    notifier: Arc<dyn PresenceNotifier>,
    config: PresenceConfig,
}

impl SessionSweepTask {
    pub fn new(
        sessions: SessionRepository,
        users: UserRepository,
        notifier: Arc<dyn PresenceNotifier>,
        config: PresenceConfig,
    ) -> Self {
        Self {
            sessions,
            users,
            notifier,
            config,
        }
    }
}

#[async_trait]
impl TaskHandler for SessionSweepTask {
    fn name(&self) -> &str {
        SESSION_SWEEP
    }

    async fn run(&self) -> AppResult<Value> {
        let now = Utc::now();
        let cutoff = now - Duration::minutes(self.config.liveness_window_minutes);

        let swept = self.sessions.sweep_inactive(cutoff).await?;
        if swept.is_empty() {
            return Ok(serde_json::json!({
                "swept_sessions": 0,
                "users_marked_offline": 0,
            }));
        }

        let affected_users: HashSet<_> = swept.iter().map(|s| s.user_id).collect();
        let mut marked_offline = 0u64;
        for user_id in affected_users {
            // A user with another live session keeps their presence.
            let remaining = self.sessions.list_active_by_user(user_id).await?;
            if remaining.is_empty() {
                self.users.mark_offline(user_id, now).await?;
                self.notifier.user_went_offline(user_id).await;
                marked_offline += 1;
            }
        }

        tracing::info!(
            swept = swept.len(),
            marked_offline,
            %cutoff,
            "stale session sweep complete"
        );

        Ok(serde_json::json!({
            "swept_sessions": swept.len(),
            "users_marked_offline": marked_offline,
            "cutoff": cutoff,
        }))
    }
}
