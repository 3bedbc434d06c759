//! Online status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Externally-observable online status of a user.
///
/// `away` and `dnd` are user-asserted and persist until explicitly
/// changed or until the user loses all sessions, at which point the
/// status is forced to `offline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "online_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OnlineStatus {
    /// User has at least one live session and no overriding assertion.
    Online,
    /// User has no live sessions.
    Offline,
    /// User-asserted away state, visible to permitted observers.
    Away,
    /// User-asserted do-not-disturb; appears offline to others.
    Dnd,
}

impl OnlineStatus {
    /// Whether this status may be requested directly by a client.
    ///
    /// `offline` is derived from session state and never client-settable.
    pub fn is_client_settable(&self) -> bool {
        !matches!(self, Self::Offline)
    }

    /// Whether the status survives a reconnect without being upgraded
    /// to `online`.
    pub fn survives_reconnect(&self) -> bool {
        matches!(self, Self::Away | Self::Dnd)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Away => "away",
            Self::Dnd => "dnd",
        }
    }

    /// Lenient decode for stored values: unknown or legacy strings fall
    /// back to `Offline` rather than erroring.
    pub fn from_db_or_offline(s: &str) -> Self {
        s.parse().unwrap_or(Self::Offline)
    }
}

impl fmt::Display for OnlineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OnlineStatus {
    type Err = khidma_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "away" => Ok(Self::Away),
            "dnd" => Ok(Self::Dnd),
            _ => Err(khidma_core::AppError::validation(format!(
                "Invalid online status: '{s}'. Expected one of: online, offline, away, dnd"
            ))),
        }
    }
}
