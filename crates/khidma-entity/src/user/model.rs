//! User entity model (presence-relevant subset).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::OnlineStatus;

/// A user as seen by the presence subsystem.
///
/// The marketplace resource layer owns the rest of the user record;
/// this subsystem reads and writes only the presence fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Display name.
    pub username: String,
    /// Current online status. Authoritative only together with session
    /// existence; `away`/`dnd` are user-asserted.
    pub online_status: OnlineStatus,
    /// Last explicit activity, also set on the final session's deactivation.
    pub last_activity: DateTime<Utc>,
    /// Privacy switch: when false, presence is hidden from everyone but self.
    pub show_online_status: bool,
    /// Optional status message, meaningful alongside `away`/`dnd`.
    pub custom_status_message: Option<String>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether other users may observe this user's presence at all.
    pub fn presence_visible(&self) -> bool {
        self.show_online_status
    }
}
