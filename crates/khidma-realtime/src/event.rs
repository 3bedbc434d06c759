//! Inbound and outbound real-time event definitions.
//!
//! The transport delivers ordered messages per connection; these enums
//! are the wire payloads in both directions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use khidma_entity::presence::PresenceView;
use khidma_entity::user::OnlineStatus;

/// Events sent by a client over its connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundEvent {
    /// Periodic liveness ping; refreshes the session heartbeat only.
    Heartbeat,
    /// Explicit user activity; refreshes heartbeat and `last_activity`.
    Activity,
    /// Request to change the user-asserted status.
    SetStatus {
        /// Requested status (`online`, `away`, `dnd`).
        status: String,
        /// Optional status message, max 100 characters.
        message: Option<String>,
    },
    /// Ephemeral typing indicator towards one recipient.
    Typing {
        /// Recipient user ID.
        to: Uuid,
    },
}

/// Events pushed by the server to connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundEvent {
    /// A subject's observable presence changed; the view is already
    /// projected for the receiving observer.
    PresenceChanged {
        /// The subject user.
        user_id: Uuid,
        /// Viewer-scoped projection.
        view: PresenceView,
        /// When the change was processed.
        timestamp: DateTime<Utc>,
    },
    /// Own-status echo sent to the user's other devices so every device
    /// converges on the same asserted state.
    StatusUpdate {
        /// The user whose status changed.
        user_id: Uuid,
        /// The new true status.
        online_status: OnlineStatus,
        /// The new status message.
        status_message: Option<String>,
        /// When the change was processed.
        timestamp: DateTime<Utc>,
    },
    /// Ephemeral typing indicator; never persisted.
    Typing {
        /// The user who is typing.
        user_id: Uuid,
        /// The recipient.
        to_user_id: Uuid,
        /// When the indicator was received.
        timestamp: DateTime<Utc>,
    },
    /// Error surfaced to the client.
    Error {
        /// Machine-readable code.
        code: String,
        /// Human-readable description.
        message: String,
    },
}
