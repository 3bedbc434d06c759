//! Presence policy configuration.

use serde::{Deserialize, Serialize};

/// Presence and session liveness configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Minutes of heartbeat silence after which a session is presumed dead.
    #[serde(default = "default_liveness_window")]
    pub liveness_window_minutes: i64,
    /// Days an inactive session row is retained before the purge removes it.
    #[serde(default = "default_retention_days")]
    pub session_retention_days: i64,
    /// Maximum length of a custom status message.
    #[serde(default = "default_max_message_len")]
    pub max_status_message_len: usize,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            liveness_window_minutes: default_liveness_window(),
            session_retention_days: default_retention_days(),
            max_status_message_len: default_max_message_len(),
        }
    }
}

fn default_liveness_window() -> i64 {
    10
}

fn default_retention_days() -> i64 {
    7
}

fn default_max_message_len() -> usize {
    100
}
