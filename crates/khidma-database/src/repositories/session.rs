//! Session repository implementation.
//!
//! Every operation is a single SQL statement, so concurrent callers
//! observe atomic transitions: a touch racing the sweep either lands
//! before the sweep's `UPDATE` evaluates `last_ping` (session stays
//! active) or after (session was already returned as swept). No
//! read-modify-write cycles.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use khidma_core::error::{AppError, ErrorKind};
use khidma_core::result::AppResult;
use khidma_entity::session::model::{CreateSession, Session};
use khidma_entity::session::DeviceType;

/// Repository for session rows (one per live connection).
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a session row for a freshly attached connection.
    ///
    /// Fails with `DuplicateConnection` if the connection id already has
    /// an active row (the partial unique index enforces this at commit).
    pub async fn create(&self, data: &CreateSession) -> AppResult<Session> {
        sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (user_id, connection_id, device_type, ip_address, user_agent) \
             VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(data.user_id)
        .bind(data.connection_id)
        .bind(data.device_type)
        .bind(data.ip_address)
        .bind(&data.user_agent)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::duplicate_connection(format!(
                    "Connection {} already has an active session",
                    data.connection_id
                ))
            }
            _ => AppError::with_source(ErrorKind::Database, "Failed to create session", e),
        })
    }

    /// Refresh `last_ping` for an active connection.
    ///
    /// Zero rows affected means the session is unknown or already
    /// inactive; surfaced as `NotFound` so callers can treat it as
    /// "already gone".
    pub async fn touch(&self, connection_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE sessions SET last_ping = $2 WHERE connection_id = $1 AND is_active")
                .bind(connection_id)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to touch session", e)
                })?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "No active session for connection {connection_id}"
            )));
        }
        Ok(())
    }

    /// Deactivate the session for a connection. Idempotent: returns
    /// `None` when the row is already inactive, so the clean-detach and
    /// sweep paths can race without a duplicate transition.
    pub async fn deactivate(&self, connection_id: Uuid) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>(
            "UPDATE sessions SET is_active = FALSE \
             WHERE connection_id = $1 AND is_active RETURNING *",
        )
        .bind(connection_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to deactivate session", e))
    }

    /// List all active sessions for a user, newest first.
    pub async fn list_active_by_user(&self, user_id: Uuid) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE user_id = $1 AND is_active \
             ORDER BY connected_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list sessions", e))
    }

    /// Atomically deactivate every active session whose `last_ping`
    /// precedes `cutoff`, returning the affected rows.
    ///
    /// The cutoff is captured once by the caller and applied against
    /// `last_ping` as observed at commit time, so a touch that lands
    /// between cutoff capture and commit keeps its session alive.
    pub async fn sweep_inactive(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "UPDATE sessions SET is_active = FALSE \
             WHERE is_active AND last_ping < $1 RETURNING *",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to sweep sessions", e))
    }

    /// Permanently delete inactive sessions older than the retention
    /// window. Active sessions are never touched.
    pub async fn purge_older_than(&self, days: i64) -> AppResult<u64> {
        let cutoff = Utc::now() - Duration::days(days);
        let result =
            sqlx::query("DELETE FROM sessions WHERE NOT is_active AND last_ping < $1")
                .bind(cutoff)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to purge sessions", e)
                })?;

        Ok(result.rows_affected())
    }

    /// Count active sessions system-wide.
    pub async fn count_active(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE is_active")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count active sessions", e)
            })
    }

    /// Count inactive (soft-deleted, not yet purged) sessions.
    pub async fn count_inactive(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE NOT is_active")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count inactive sessions", e)
            })
    }

    /// Count distinct users with at least one active session.
    pub async fn count_distinct_active_users(&self) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM sessions WHERE is_active")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count connected users", e)
            })
    }

    /// Active session counts grouped by device type.
    pub async fn device_distribution(&self) -> AppResult<Vec<(DeviceType, i64)>> {
        sqlx::query_as::<_, (DeviceType, i64)>(
            "SELECT device_type, COUNT(*) FROM sessions WHERE is_active GROUP BY device_type",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to compute device distribution", e)
        })
    }

    /// Count sessions past the liveness threshold but not yet swept.
    pub async fn count_stale(&self, cutoff: DateTime<Utc>) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE is_active AND last_ping < $1")
            .bind(cutoff)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count stale sessions", e)
            })
    }
}
