//! # khidma-realtime
//!
//! Real-time presence engine for Khidma. Provides:
//!
//! - The pure presence policy engine (viewer-scoped projections)
//! - The in-process connection registry (user → live connections)
//! - The presence broadcaster (fan-out of presence/typing/status events)
//! - The event gateway wiring attach/inbound/detach to the session store
//! - Per-connection heartbeat monitoring

pub mod broadcast;
pub mod connection;
pub mod event;
pub mod gateway;
pub mod observer;
pub mod policy;

pub use broadcast::PresenceBroadcaster;
pub use connection::registry::ConnectionRegistry;
pub use gateway::PresenceGateway;
pub use observer::ObserverLookup;
