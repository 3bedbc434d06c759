//! In-process connection tracking.

pub mod handle;
pub mod heartbeat;
pub mod registry;

pub use handle::{ConnectionHandle, ConnectionId};
pub use registry::ConnectionRegistry;
