//! Session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::DeviceType;

/// One row per live (or recently live) real-time connection.
///
/// Created on connection attach; `last_ping` refreshed on every
/// heartbeat or activity event; `is_active` flips to false either on a
/// clean detach or when the sweep finds the heartbeat expired. Inactive
/// rows are retained for audit and metrics until the purge removes them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    /// Unique session identifier.
    pub id: Uuid,
    /// The user this session belongs to.
    pub user_id: Uuid,
    /// Transport-assigned connection identifier, unique per live connection.
    pub connection_id: Uuid,
    /// Kind of client device.
    pub device_type: DeviceType,
    /// IP address from which the connection was attached.
    pub ip_address: std::net::IpAddr,
    /// User-Agent header value.
    pub user_agent: Option<String>,
    /// When the connection attached.
    pub connected_at: DateTime<Utc>,
    /// Last liveness signal (heartbeat or inbound activity).
    pub last_ping: DateTime<Utc>,
    /// False means soft-deleted; retained until the purge.
    pub is_active: bool,
}

impl Session {
    /// Whether the session's heartbeat has expired relative to `cutoff`.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_ping < cutoff
    }

    /// How long the session has been silent, in seconds.
    pub fn silent_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_ping).num_seconds().max(0)
    }
}

/// Data required to create a new session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSession {
    /// The user this session belongs to.
    pub user_id: Uuid,
    /// Transport-assigned connection identifier.
    pub connection_id: Uuid,
    /// Kind of client device.
    pub device_type: DeviceType,
    /// IP address of the client.
    pub ip_address: std::net::IpAddr,
    /// User-Agent header.
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(last_ping: DateTime<Utc>) -> Session {
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            connection_id: Uuid::new_v4(),
            device_type: DeviceType::Web,
            ip_address: "127.0.0.1".parse().unwrap(),
            user_agent: None,
            connected_at: last_ping,
            last_ping,
            is_active: true,
        }
    }

    #[test]
    fn staleness_is_relative_to_cutoff() {
        let now = Utc::now();
        let session = sample(now - Duration::minutes(15));
        assert!(session.is_stale(now - Duration::minutes(10)));
        assert!(!session.is_stale(now - Duration::minutes(20)));
    }

    #[test]
    fn silent_seconds_never_negative() {
        let now = Utc::now();
        let session = sample(now + Duration::seconds(5));
        assert_eq!(session.silent_seconds(now), 0);
    }
}
