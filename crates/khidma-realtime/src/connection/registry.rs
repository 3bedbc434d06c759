//! Connection registry: the single shared in-memory structure mapping
//! users to their live connections.
//!
//! Not durable. After a process restart the registry is empty, which is
//! safe: clients must re-attach and re-register their sessions.
//! Handles are cloned out of the map before any send, so no shard lock
//! is ever held across fan-out and there are no per-user locks to
//! order.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use super::handle::{ConnectionHandle, ConnectionId};

/// Thread-safe registry of all live connections in this process.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// User ID → connections (one user may have several devices).
    by_user: DashMap<Uuid, Vec<Arc<ConnectionHandle>>>,
    /// Connection ID → handle, for direct lookup.
    by_id: DashMap<ConnectionId, Arc<ConnectionHandle>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection.
    ///
    /// A handle already registered under the same connection id is
    /// displaced and marked dead: the transport reusing the id means
    /// the old connection is gone even if its teardown never ran.
    pub fn attach(&self, handle: Arc<ConnectionHandle>) {
        if let Some(displaced) = self.by_id.insert(handle.id, handle.clone()) {
            if let Some(mut connections) = self.by_user.get_mut(&displaced.user_id) {
                connections.retain(|c| !Arc::ptr_eq(c, &displaced));
            }
            displaced.mark_dead();
        }
        self.by_user.entry(handle.user_id).or_default().push(handle);
    }

    /// Remove a connection. Returns the handle if it was present.
    ///
    /// Removal from the per-user list is by handle identity, so a
    /// replacement handle that reused the same connection id is never
    /// taken down with its predecessor.
    pub fn detach(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.by_id.remove(conn_id)?;
        if let Some(mut connections) = self.by_user.get_mut(&handle.user_id) {
            connections.retain(|c| !Arc::ptr_eq(c, &handle));
        }
        // Guarded removal: a concurrent attach may have repopulated the
        // entry between the retain and this call.
        self.by_user
            .remove_if(&handle.user_id, |_, connections| connections.is_empty());
        Some(handle)
    }

    /// All connections currently attached for a user.
    pub fn connections_of(&self, user_id: &Uuid) -> Vec<Arc<ConnectionHandle>> {
        self.by_user
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Look up a single connection.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.by_id.get(conn_id).map(|entry| entry.value().clone())
    }

    /// Whether the user has at least one attached connection.
    pub fn is_online(&self, user_id: &Uuid) -> bool {
        self.by_user
            .get(user_id)
            .map(|c| !c.is_empty())
            .unwrap_or(false)
    }

    /// The earliest-attached connection for a user, if any.
    pub fn oldest_connection_of(&self, user_id: &Uuid) -> Option<Arc<ConnectionHandle>> {
        self.connections_of(user_id)
            .into_iter()
            .min_by_key(|c| c.connected_at)
    }

    /// All user IDs with at least one attached connection.
    pub fn connected_user_ids(&self) -> Vec<Uuid> {
        self.by_user.iter().map(|entry| *entry.key()).collect()
    }

    /// Total number of attached connections.
    pub fn connection_count(&self) -> usize {
        self.by_id.len()
    }

    /// Number of distinct users with attached connections.
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    /// All handles, for shutdown.
    pub fn all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.by_id.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::OutboundEvent;
    use khidma_entity::session::DeviceType;
    use tokio::sync::mpsc;

    fn handle_for(user_id: Uuid) -> Arc<ConnectionHandle> {
        let (tx, _rx) = mpsc::channel::<OutboundEvent>(4);
        Arc::new(ConnectionHandle::new(
            Uuid::new_v4(),
            user_id,
            Uuid::new_v4(),
            DeviceType::Web,
            tx,
        ))
    }

    #[tokio::test]
    async fn attach_then_detach() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let handle = handle_for(user);
        registry.attach(handle.clone());

        assert!(registry.is_online(&user));
        assert_eq!(registry.connection_count(), 1);

        let removed = registry.detach(&handle.id);
        assert!(removed.is_some());
        assert!(!registry.is_online(&user));
        assert_eq!(registry.user_count(), 0);
    }

    #[tokio::test]
    async fn multi_device_stays_online_until_last_detach() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let first = handle_for(user);
        let second = handle_for(user);
        registry.attach(first.clone());
        registry.attach(second.clone());

        assert_eq!(registry.connections_of(&user).len(), 2);
        assert_eq!(registry.user_count(), 1);

        registry.detach(&first.id);
        assert!(registry.is_online(&user));

        registry.detach(&second.id);
        assert!(!registry.is_online(&user));
    }

    #[tokio::test]
    async fn detach_unknown_connection_is_none() {
        let registry = ConnectionRegistry::new();
        assert!(registry.detach(&Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn reattach_with_same_connection_id_displaces_predecessor() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let conn_id = Uuid::new_v4();

        let (stale_tx, _stale_rx) = mpsc::channel::<OutboundEvent>(4);
        let stale = Arc::new(ConnectionHandle::new(
            conn_id,
            user,
            Uuid::new_v4(),
            DeviceType::Web,
            stale_tx,
        ));
        let (live_tx, _live_rx) = mpsc::channel::<OutboundEvent>(4);
        let live = Arc::new(ConnectionHandle::new(
            conn_id,
            user,
            Uuid::new_v4(),
            DeviceType::Web,
            live_tx,
        ));

        registry.attach(stale.clone());
        registry.attach(live.clone());

        // The predecessor is out of both maps and dead; the user holds
        // exactly one connection, the replacement.
        assert!(!stale.is_alive());
        assert!(live.is_alive());
        assert_eq!(registry.connections_of(&user).len(), 1);
        let current = registry.get(&conn_id).unwrap();
        assert!(Arc::ptr_eq(&current, &live));

        // Tearing down the connection id removes only the replacement,
        // leaving a consistent empty state.
        let removed = registry.detach(&conn_id).unwrap();
        assert!(Arc::ptr_eq(&removed, &live));
        assert!(!registry.is_online(&user));
        assert_eq!(registry.connection_count(), 0);
    }

    #[tokio::test]
    async fn oldest_connection_is_earliest_attached() {
        let registry = ConnectionRegistry::new();
        let user = Uuid::new_v4();
        let first = handle_for(user);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = handle_for(user);
        registry.attach(second);
        registry.attach(first.clone());

        let oldest = registry.oldest_connection_of(&user).unwrap();
        assert_eq!(oldest.id, first.id);
    }
}
