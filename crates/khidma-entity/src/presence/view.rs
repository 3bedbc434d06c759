//! Viewer-scoped presence projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::OnlineStatus;

/// What one viewer is allowed to see of a subject's presence.
///
/// Produced by the policy engine; may deliberately differ from the
/// subject's true state (privacy switch, dnd masking).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceView {
    /// The subject user.
    pub user_id: Uuid,
    /// Projected status, possibly masked.
    pub online_status: OnlineStatus,
    /// Human-readable recency phrase ("Last seen recently", "Away", ...).
    pub last_seen_text: String,
    /// Exact last-seen timestamp; null when the viewer may not see it.
    pub last_seen: Option<DateTime<Utc>>,
    /// Whether the subject exposes presence to this viewer at all.
    pub show_status: bool,
    /// Custom status message, only when the viewer may see it.
    pub status_message: Option<String>,
}
