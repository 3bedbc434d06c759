//! Liveness monitoring for attached connections.
//!
//! Clients send periodic heartbeat events; this loop watches the
//! handle's last-seen timestamp and marks the connection dead once it
//! has been silent past the timeout. The caller runs the loop as its
//! own task and detaches the connection when the loop returns.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;

use khidma_core::config::RealtimeConfig;

use super::handle::ConnectionHandle;

/// Heartbeat monitor settings.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// How often to check the connection.
    pub check_interval: Duration,
    /// Silence beyond this marks the connection dead.
    pub timeout: Duration,
}

impl From<&RealtimeConfig> for HeartbeatConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            check_interval: Duration::from_secs(config.heartbeat_interval_seconds),
            timeout: Duration::from_secs(config.heartbeat_timeout_seconds),
        }
    }
}

/// Run the liveness check loop for one connection.
///
/// Returns once the connection is dead, either because the client went
/// silent past the timeout or because something else marked it dead.
pub async fn run_monitor(handle: Arc<ConnectionHandle>, config: HeartbeatConfig) {
    let mut interval = time::interval(config.check_interval);
    // The first tick fires immediately; skip it so a fresh connection
    // is not checked at age zero.
    interval.tick().await;

    loop {
        interval.tick().await;

        if !handle.is_alive() {
            break;
        }

        let last_seen = handle.last_seen().await;
        let silence = Utc::now() - last_seen;

        if let Ok(silence_std) = silence.to_std() {
            if silence_std > config.timeout {
                tracing::warn!(
                    connection_id = %handle.id,
                    user_id = %handle.user_id,
                    silent_for = ?silence_std,
                    "connection heartbeat timeout, marking dead"
                );
                handle.mark_dead();
                break;
            }
        }
    }

    tracing::debug!(connection_id = %handle.id, "heartbeat monitor ended");
}
