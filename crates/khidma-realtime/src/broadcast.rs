//! Presence broadcaster: the single write path for presence state.
//!
//! Every lifecycle transition goes through here so that the database is
//! updated before any event is fanned out. Delivery uses non-blocking
//! sends; a slow consumer loses events rather than stalling the
//! broadcast. Observer-scoped projection happens per recipient, so two
//! observers of the same subject may legitimately receive different
//! views of the same change.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use khidma_core::config::PresenceConfig;
use khidma_core::{AppError, AppResult};
use khidma_database::repositories::{SessionRepository, UserRepository};
use khidma_entity::user::OnlineStatus;

use crate::connection::ConnectionRegistry;
use crate::event::OutboundEvent;
use crate::observer::ObserverLookup;
use crate::policy;

/// Validate a client-requested status change.
///
/// `offline` is derived from session state and can never be asserted by
/// a client. The status message length limit comes from configuration.
pub fn validate_status_change(
    status: &str,
    message: Option<&str>,
    max_message_len: usize,
) -> AppResult<OnlineStatus> {
    let status = OnlineStatus::from_str(status)?;
    if !status.is_client_settable() {
        return Err(AppError::validation(
            "offline cannot be set directly; it is derived from session state",
        ));
    }
    if let Some(message) = message {
        if message.chars().count() > max_message_len {
            return Err(AppError::validation(format!(
                "status message exceeds {max_message_len} characters"
            )));
        }
    }
    Ok(status)
}

/// Coordinates presence persistence and event fan-out.
#[derive(Debug, Clone)]
pub struct PresenceBroadcaster {
    registry: Arc<ConnectionRegistry>,
    sessions: SessionRepository,
    users: UserRepository,
    observers: Arc<dyn ObserverLookup>,
    config: PresenceConfig,
}

impl PresenceBroadcaster {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        sessions: SessionRepository,
        users: UserRepository,
        observers: Arc<dyn ObserverLookup>,
        config: PresenceConfig,
    ) -> Self {
        Self {
            registry,
            sessions,
            users,
            observers,
            config,
        }
    }

    /// Handle a user coming online on some connection.
    ///
    /// The status only moves to `online` if the user is not currently
    /// `away` or `dnd`; a user-asserted status survives reconnects.
    /// Fan-out only happens when observers can actually see something
    /// new: the status changed, or this is the user's first active
    /// session. An additional device on an already-present user
    /// changes nothing observable.
    pub async fn on_connect(&self, user_id: Uuid) -> AppResult<()> {
        let changed = self.users.mark_online(user_id).await?;
        let active = self.sessions.list_active_by_user(user_id).await?;
        let first_session = active.len() <= 1;
        tracing::debug!(
            %user_id,
            status_changed = changed,
            active_sessions = active.len(),
            "user connected"
        );
        if changed || first_session {
            self.broadcast_presence(user_id).await;
        }
        Ok(())
    }

    /// Handle a connection going away.
    ///
    /// Idempotent: the session row is deactivated at most once. The
    /// user only transitions to `offline` when this was their last
    /// active session, so closing one of several devices changes
    /// nothing observable.
    pub async fn on_disconnect(&self, connection_id: Uuid) -> AppResult<()> {
        let Some(session) = self.sessions.deactivate(connection_id).await? else {
            tracing::debug!(%connection_id, "disconnect for already-inactive session");
            return Ok(());
        };

        let remaining = self.sessions.list_active_by_user(session.user_id).await?;
        if remaining.is_empty() && !self.registry.is_online(&session.user_id) {
            self.users.mark_offline(session.user_id, Utc::now()).await?;
            tracing::info!(user_id = %session.user_id, "user went offline");
            self.broadcast_presence(session.user_id).await;
        }
        Ok(())
    }

    /// Refresh the liveness timestamp for one session.
    pub async fn on_heartbeat(&self, connection_id: Uuid) -> AppResult<()> {
        self.sessions.touch(connection_id, Utc::now()).await
    }

    /// Record explicit user activity.
    ///
    /// Updates both the session heartbeat and the user's last-activity
    /// timestamp. No fan-out: activity alone changes nothing observers
    /// can see while the user remains connected.
    pub async fn on_activity(&self, connection_id: Uuid, user_id: Uuid) -> AppResult<()> {
        let now = Utc::now();
        self.sessions.touch(connection_id, now).await?;
        self.users.touch_activity(user_id, now).await
    }

    /// Apply a user-asserted status change and notify interested
    /// parties.
    pub async fn on_status_change(
        &self,
        user_id: Uuid,
        status: &str,
        message: Option<String>,
    ) -> AppResult<()> {
        let status = validate_status_change(
            status,
            message.as_deref(),
            self.config.max_status_message_len,
        )?;

        self.users
            .set_status(user_id, status, message.as_deref())
            .await?;
        tracing::info!(%user_id, status = %status, "status changed");

        self.broadcast_presence(user_id).await;

        // Own devices get the true status so every device converges.
        let echo = OutboundEvent::StatusUpdate {
            user_id,
            online_status: status,
            status_message: message,
            timestamp: Utc::now(),
        };
        for handle in self.registry.connections_of(&user_id) {
            handle.send(echo.clone());
        }
        Ok(())
    }

    /// Relay a typing indicator to the recipient's connections.
    ///
    /// Ephemeral: nothing is persisted, and an offline recipient simply
    /// receives nothing.
    pub fn typing(&self, from_user: Uuid, to_user: Uuid) {
        let event = OutboundEvent::Typing {
            user_id: from_user,
            to_user_id: to_user,
            timestamp: Utc::now(),
        };
        for handle in self.registry.connections_of(&to_user) {
            handle.send(event.clone());
        }
    }

    /// Fan out the subject's current presence to every connected
    /// observer, each with their own projection.
    ///
    /// Fails closed: if the observer lookup errors, nothing is
    /// delivered rather than delivering unfiltered state to everyone.
    /// Fan-out errors never propagate to the caller; the state change
    /// has already been persisted.
    pub async fn broadcast_presence(&self, subject_id: Uuid) {
        let subject = match self.users.find_by_id(subject_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(user_id = %subject_id, "broadcast for unknown user");
                return;
            }
            Err(error) => {
                tracing::error!(user_id = %subject_id, %error, "failed to load user for broadcast");
                return;
            }
        };

        let observers = match self.observers.observers_of(subject_id).await {
            Ok(observers) => observers,
            Err(error) => {
                tracing::error!(
                    user_id = %subject_id,
                    %error,
                    "observer lookup failed, suppressing broadcast"
                );
                return;
            }
        };

        let now = Utc::now();
        let mut delivered = 0usize;
        for observer_id in observers {
            let connections = self.registry.connections_of(&observer_id);
            if connections.is_empty() {
                continue;
            }
            let view = policy::project(&subject, observer_id, now);
            let event = OutboundEvent::PresenceChanged {
                user_id: subject_id,
                view,
                timestamp: now,
            };
            for handle in connections {
                if handle.send(event.clone()) {
                    delivered += 1;
                }
            }
        }
        tracing::debug!(user_id = %subject_id, delivered, "presence broadcast complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_offline_as_client_status() {
        let result = validate_status_change("offline", None, 100);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(validate_status_change("invisible", None, 100).is_err());
    }

    #[test]
    fn rejects_overlong_message() {
        let long = "x".repeat(101);
        assert!(validate_status_change("away", Some(&long), 100).is_err());
    }

    #[test]
    fn accepts_settable_statuses() {
        for status in ["online", "away", "dnd"] {
            let parsed = validate_status_change(status, Some("back soon"), 100);
            assert!(parsed.is_ok(), "{status} should be settable");
        }
    }

    #[test]
    fn message_limit_counts_characters_not_bytes() {
        let message = "é".repeat(100);
        assert!(validate_status_change("away", Some(&message), 100).is_ok());
    }
}
