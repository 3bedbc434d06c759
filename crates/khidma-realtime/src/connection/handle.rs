//! Individual connection handle.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use khidma_entity::session::DeviceType;

use crate::event::OutboundEvent;

/// Transport-assigned connection identifier.
pub type ConnectionId = Uuid;

/// A handle to a single live connection.
///
/// Holds the bounded sender for pushing events to the client plus
/// metadata about the owning user and session. Sends never block: a
/// full buffer drops the event, a closed channel marks the handle dead.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Transport connection ID.
    pub id: ConnectionId,
    /// User who owns this connection.
    pub user_id: Uuid,
    /// Session row this connection maps to.
    pub session_id: Uuid,
    /// Device kind behind the connection.
    pub device_type: DeviceType,
    /// When the connection attached.
    pub connected_at: DateTime<Utc>,
    /// Sender for outbound events.
    sender: mpsc::Sender<OutboundEvent>,
    /// Last inbound liveness signal seen by this process.
    last_seen: tokio::sync::RwLock<DateTime<Utc>>,
    /// Whether the connection is still alive.
    alive: AtomicBool,
}

impl ConnectionHandle {
    /// Create a new connection handle.
    pub fn new(
        id: ConnectionId,
        user_id: Uuid,
        session_id: Uuid,
        device_type: DeviceType,
        sender: mpsc::Sender<OutboundEvent>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            session_id,
            device_type,
            connected_at: now,
            sender,
            last_seen: tokio::sync::RwLock::new(now),
            alive: AtomicBool::new(true),
        }
    }

    /// Push an event to this connection without blocking.
    ///
    /// Returns false when the event could not be delivered. Delivery
    /// failures are best-effort by contract and never propagate.
    pub fn send(&self, event: OutboundEvent) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.id, "Send buffer full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                false
            }
        }
    }

    /// Check if the connection is alive.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark the connection dead; subsequent sends become no-ops.
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Record an inbound liveness signal.
    pub async fn touch(&self) {
        let mut seen = self.last_seen.write().await;
        *seen = Utc::now();
    }

    /// When the connection last signalled liveness.
    pub async fn last_seen(&self) -> DateTime<Utc> {
        *self.last_seen.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_with_buffer(size: usize) -> (ConnectionHandle, mpsc::Receiver<OutboundEvent>) {
        let (tx, rx) = mpsc::channel(size);
        let handle = ConnectionHandle::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            DeviceType::Web,
            tx,
        );
        (handle, rx)
    }

    #[tokio::test]
    async fn send_delivers_events() {
        let (handle, mut rx) = handle_with_buffer(4);
        assert!(handle.send(OutboundEvent::Error {
            code: "TEST".to_string(),
            message: "hello".to_string(),
        }));
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn full_buffer_drops_without_blocking() {
        let (handle, _rx) = handle_with_buffer(1);
        let event = || OutboundEvent::Error {
            code: "TEST".to_string(),
            message: "x".to_string(),
        };
        assert!(handle.send(event()));
        assert!(!handle.send(event()));
        assert!(handle.is_alive());
    }

    #[tokio::test]
    async fn closed_channel_marks_dead() {
        let (handle, rx) = handle_with_buffer(1);
        drop(rx);
        assert!(!handle.send(OutboundEvent::Error {
            code: "TEST".to_string(),
            message: "x".to_string(),
        }));
        assert!(!handle.is_alive());
    }
}
