//! Shared harness for the live-database tests.

use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use khidma_core::config::{DatabaseConfig, PresenceConfig, RealtimeConfig};
use khidma_database::repositories::{SessionRepository, UserRepository};
use khidma_database::{migration, DatabasePool};
use khidma_entity::DeviceType;
use khidma_realtime::connection::ConnectionHandle;
use khidma_realtime::event::OutboundEvent;
use khidma_realtime::gateway::AttachRequest;
use khidma_realtime::observer::StaticObserverLookup;
use khidma_realtime::{ConnectionRegistry, PresenceBroadcaster, PresenceGateway};

/// A fully wired presence stack on top of the test database.
pub struct TestApp {
    pub db: DatabasePool,
    pub sessions: SessionRepository,
    pub users: UserRepository,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: PresenceBroadcaster,
    pub gateway: PresenceGateway,
}

impl TestApp {
    /// Connect to the database named by `KHIDMA_TEST_DATABASE_URL` and
    /// build the full stack with the given observer set. Returns `None`
    /// when the variable is unset so callers can skip.
    pub async fn connect(observers: Vec<Uuid>) -> Option<Self> {
        let url = std::env::var("KHIDMA_TEST_DATABASE_URL").ok()?;
        let config = DatabaseConfig {
            url,
            max_connections: 5,
            min_connections: 1,
            connect_timeout_seconds: 5,
            idle_timeout_seconds: 60,
        };
        let db = DatabasePool::connect(&config)
            .await
            .expect("connect to test database");
        migration::run_migrations(db.pool())
            .await
            .expect("run migrations");

        let sessions = SessionRepository::new(db.pool().clone());
        let users = UserRepository::new(db.pool().clone());
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = PresenceBroadcaster::new(
            registry.clone(),
            sessions.clone(),
            users.clone(),
            Arc::new(StaticObserverLookup::new(observers)),
            PresenceConfig::default(),
        );
        let gateway = PresenceGateway::new(
            registry.clone(),
            broadcaster.clone(),
            sessions.clone(),
            users.clone(),
            RealtimeConfig::default(),
        );

        Some(Self {
            db,
            sessions,
            users,
            registry,
            broadcaster,
            gateway,
        })
    }

    /// Insert a user row with a run-unique username.
    pub async fn insert_user(&self, id: Uuid, name: &str) {
        sqlx::query("INSERT INTO users (id, username) VALUES ($1, $2)")
            .bind(id)
            .bind(format!("{name}-{id}"))
            .execute(self.db.pool())
            .await
            .expect("insert user");
    }

    /// Attach a bare connection for an observer straight into the
    /// registry, bypassing the gateway, so broadcasts can be counted
    /// without the observer's own lifecycle events getting in the way.
    pub fn attach_observer(&self, user_id: Uuid) -> mpsc::Receiver<OutboundEvent> {
        let (tx, rx) = mpsc::channel(32);
        let handle = Arc::new(ConnectionHandle::new(
            Uuid::new_v4(),
            user_id,
            Uuid::new_v4(),
            DeviceType::Web,
            tx,
        ));
        self.registry.attach(handle);
        rx
    }

    pub fn attach_request(user_id: Uuid, connection_id: Uuid) -> AttachRequest {
        AttachRequest {
            user_id,
            connection_id,
            device_type: DeviceType::Web,
            ip_address: "127.0.0.1".parse().expect("loopback address"),
            user_agent: None,
        }
    }
}

/// Collect everything currently buffered on an outbound channel.
pub fn drain(rx: &mut mpsc::Receiver<OutboundEvent>) -> Vec<OutboundEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
