//! Manual presence repair.
//!
//! Forces users shown as present without any active session back to
//! offline. Never scheduled: the health check reports the drift and an
//! operator decides when to repair, so a transient inconsistency
//! observed mid-connect is not repaired away automatically.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use khidma_core::AppResult;
use khidma_database::repositories::UserRepository;

use crate::executor::TaskHandler;
use crate::jobs::PRESENCE_REPAIR;
use crate::notifier::PresenceNotifier;

#[derive(Debug)]
pub struct PresenceRepairTask {
    users: UserRepository,
    notifier: Arc<dyn PresenceNotifier>,
}

impl PresenceRepairTask {
    pub fn new(users: UserRepository, notifier: Arc<dyn PresenceNotifier>) -> Self {
        Self { users, notifier }
    }
}

#[async_trait]
impl TaskHandler for PresenceRepairTask {
    fn name(&self) -> &str {
        PRESENCE_REPAIR
    }

    async fn run(&self) -> AppResult<Value> {
        let inconsistent = self.users.find_present_without_sessions().await?;
        if inconsistent.is_empty() {
            return Ok(serde_json::json!({"repaired_users": 0}));
        }

        let repaired = self.users.force_offline(&inconsistent).await?;
        for user_id in &inconsistent {
            self.notifier.user_went_offline(*user_id).await;
        }

        tracing::info!(repaired, "presence repair forced inconsistent users offline");
        Ok(serde_json::json!({
            "repaired_users": repaired,
            "user_ids": inconsistent,
        }))
    }
}
