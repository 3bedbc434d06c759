//! Event gateway: connection lifecycle entry point.
//!
//! The transport layer (WebSocket handlers, or an in-process harness)
//! calls `attach` when a client arrives, feeds decoded events through
//! `handle_inbound`, and calls `detach` when the socket closes. The
//! gateway owns the session row for a connection and keeps the
//! registry, the database, and the broadcaster in step.

use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use khidma_core::config::RealtimeConfig;
use khidma_core::{AppError, AppResult, ErrorKind};
use khidma_database::repositories::{SessionRepository, UserRepository};
use khidma_entity::presence::PresenceView;
use khidma_entity::session::{CreateSession, DeviceType};

use crate::broadcast::PresenceBroadcaster;
use crate::connection::heartbeat::{self, HeartbeatConfig};
use crate::connection::{ConnectionHandle, ConnectionId, ConnectionRegistry};
use crate::event::{InboundEvent, OutboundEvent};
use crate::policy;

/// Parameters for attaching a new connection.
#[derive(Debug, Clone)]
pub struct AttachRequest {
    pub user_id: Uuid,
    /// Transport-assigned connection identifier. A client reconnecting
    /// before its old session was cleaned up presents the same ID.
    pub connection_id: ConnectionId,
    pub device_type: DeviceType,
    pub ip_address: IpAddr,
    pub user_agent: Option<String>,
}

/// Glue between the transport, the session store, and the broadcaster.
#[derive(Debug, Clone)]
pub struct PresenceGateway {
    registry: Arc<ConnectionRegistry>,
    broadcaster: PresenceBroadcaster,
    sessions: SessionRepository,
    users: UserRepository,
    config: RealtimeConfig,
}

impl PresenceGateway {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        broadcaster: PresenceBroadcaster,
        sessions: SessionRepository,
        users: UserRepository,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            sessions,
            users,
            config,
        }
    }

    /// Attach a new client connection.
    ///
    /// Persists the session row before the connection becomes visible
    /// in the registry, so observers never see a connection without a
    /// backing session. Returns the handle plus the receiver the
    /// transport drains for outbound events.
    pub async fn attach(
        &self,
        request: AttachRequest,
    ) -> AppResult<(Arc<ConnectionHandle>, mpsc::Receiver<OutboundEvent>)> {
        self.evict_if_over_limit(request.user_id).await?;

        let session = self.create_session(&request).await?;

        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size);
        let handle = Arc::new(ConnectionHandle::new(
            request.connection_id,
            request.user_id,
            session.id,
            request.device_type,
            tx,
        ));
        self.registry.attach(handle.clone());

        tracing::info!(
            user_id = %request.user_id,
            connection_id = %request.connection_id,
            device = %request.device_type,
            "connection attached"
        );

        self.broadcaster.on_connect(request.user_id).await?;
        self.spawn_monitor(handle.clone());

        Ok((handle, rx))
    }

    /// Create the session row, resolving connection-ID collisions by
    /// force-deactivating the stale row and retrying once. The unique
    /// index on active connection IDs makes the collision detectable;
    /// the stale row is a leftover from an unclean disconnect of the
    /// same transport connection.
    async fn create_session(&self, request: &AttachRequest) -> AppResult<khidma_entity::Session> {
        let data = CreateSession {
            user_id: request.user_id,
            connection_id: request.connection_id,
            device_type: request.device_type,
            ip_address: request.ip_address,
            user_agent: request.user_agent.clone(),
        };

        match self.sessions.create(&data).await {
            Ok(session) => Ok(session),
            Err(error) if error.is_kind(ErrorKind::DuplicateConnection) => {
                tracing::warn!(
                    connection_id = %request.connection_id,
                    "stale active session with same connection id, force-deactivating"
                );
                // Evict the stale handle before touching the database so
                // its later teardown cannot target the replacement.
                if let Some(stale) = self.registry.detach(&request.connection_id) {
                    stale.mark_dead();
                }
                self.sessions.deactivate(request.connection_id).await?;
                self.sessions.create(&data).await
            }
            Err(error) => Err(error),
        }
    }

    /// Detach the user's oldest connection when they are at the
    /// per-user connection limit.
    async fn evict_if_over_limit(&self, user_id: Uuid) -> AppResult<()> {
        let current = self.registry.connections_of(&user_id).len();
        if current < self.config.max_connections_per_user {
            return Ok(());
        }
        if let Some(oldest) = self.registry.oldest_connection_of(&user_id) {
            tracing::warn!(
                %user_id,
                evicted = %oldest.id,
                limit = self.config.max_connections_per_user,
                "connection limit reached, evicting oldest connection"
            );
            self.detach(oldest.id).await?;
        }
        Ok(())
    }

    /// Dispatch one decoded client event.
    ///
    /// Validation failures are reported back on the same connection;
    /// they never tear the connection down.
    pub async fn handle_inbound(
        &self,
        handle: &Arc<ConnectionHandle>,
        event: InboundEvent,
    ) -> AppResult<()> {
        handle.touch().await;
        match event {
            InboundEvent::Heartbeat => {
                let result = self.broadcaster.on_heartbeat(handle.id).await;
                self.recover_missing_session(handle, result).await
            }
            InboundEvent::Activity => {
                let result = self.broadcaster.on_activity(handle.id, handle.user_id).await;
                self.recover_missing_session(handle, result).await
            }
            InboundEvent::SetStatus { status, message } => {
                match self
                    .broadcaster
                    .on_status_change(handle.user_id, &status, message)
                    .await
                {
                    Ok(()) => Ok(()),
                    Err(error) if error.is_kind(ErrorKind::Validation) => {
                        handle.send(OutboundEvent::Error {
                            code: error.kind.to_string(),
                            message: error.message.clone(),
                        });
                        Ok(())
                    }
                    Err(error) => Err(error),
                }
            }
            InboundEvent::Typing { to } => {
                self.broadcaster.typing(handle.user_id, to);
                Ok(())
            }
        }
    }

    /// Treat a missing session as "connection already gone": the row
    /// was force-deactivated or repaired out from under a live
    /// connection, so the connection is detached rather than the
    /// transport being handed an error.
    async fn recover_missing_session(
        &self,
        handle: &Arc<ConnectionHandle>,
        result: AppResult<()>,
    ) -> AppResult<()> {
        match result {
            Err(error) if error.is_kind(ErrorKind::NotFound) => {
                tracing::warn!(
                    connection_id = %handle.id,
                    user_id = %handle.user_id,
                    "session no longer active for live connection, detaching"
                );
                self.detach(handle.id).await
            }
            other => other,
        }
    }

    /// Tear down a connection.
    ///
    /// Safe to call more than once for the same connection; the second
    /// call finds nothing in the registry and the session deactivation
    /// is a no-op.
    pub async fn detach(&self, connection_id: ConnectionId) -> AppResult<()> {
        if let Some(handle) = self.registry.detach(&connection_id) {
            handle.mark_dead();
            tracing::info!(
                user_id = %handle.user_id,
                %connection_id,
                "connection detached"
            );
        }
        self.broadcaster.on_disconnect(connection_id).await
    }

    /// One-shot presence query: how `viewer` currently sees `subject`.
    pub async fn presence_for(&self, subject_id: Uuid, viewer_id: Uuid) -> AppResult<PresenceView> {
        let subject = self
            .users
            .find_by_id(subject_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {subject_id} not found")))?;
        Ok(policy::project(&subject, viewer_id, chrono::Utc::now()))
    }

    /// Run the liveness monitor for a connection and detach it when the
    /// monitor ends.
    fn spawn_monitor(&self, handle: Arc<ConnectionHandle>) {
        let gateway = self.clone();
        let config = HeartbeatConfig::from(&self.config);
        tokio::spawn(async move {
            let connection_id = handle.id;
            heartbeat::run_monitor(Arc::clone(&handle), config).await;

            // A reconnect may have reused this connection id; only the
            // handle still registered may tear the session down.
            let still_current = gateway
                .registry
                .get(&connection_id)
                .is_some_and(|current| Arc::ptr_eq(&current, &handle));
            if !still_current {
                tracing::debug!(
                    %connection_id,
                    "monitor ended for a displaced connection, skipping detach"
                );
                return;
            }

            if let Err(error) = gateway.detach(connection_id).await {
                tracing::error!(%connection_id, %error, "detach after heartbeat timeout failed");
            }
        });
    }
}
