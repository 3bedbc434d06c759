//! User repository implementation (presence fields only).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use khidma_core::error::{AppError, ErrorKind};
use khidma_core::result::AppResult;
use khidma_entity::user::model::User;
use khidma_entity::user::OnlineStatus;

/// Repository for the presence-relevant subset of the user record.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, online_status, last_activity, show_online_status, \
             custom_status_message, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))
    }

    /// Set a user-asserted status and optional message.
    pub async fn set_status(
        &self,
        user_id: Uuid,
        status: OnlineStatus,
        message: Option<&str>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET online_status = $2, custom_status_message = $3 WHERE id = $1",
        )
        .bind(user_id)
        .bind(status)
        .bind(message)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to set status", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("User {user_id} not found")));
        }
        Ok(())
    }

    /// Mark a user online, unless a user-asserted `away`/`dnd` state is
    /// in effect (those survive reconnection). Returns whether the
    /// stored status actually changed; an already-online user is a
    /// no-op and reports `false`.
    pub async fn mark_online(&self, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET online_status = 'online' \
             WHERE id = $1 AND online_status = 'offline'",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark user online", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Force a user offline and record when they were last seen.
    /// Used when the final session deactivates; also clears any
    /// user-asserted state.
    pub async fn mark_offline(&self, user_id: Uuid, last_activity: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE users SET online_status = 'offline', last_activity = $2 WHERE id = $1")
            .bind(user_id)
            .bind(last_activity)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to mark user offline", e)
            })?;
        Ok(())
    }

    /// Refresh the user's last-activity timestamp.
    pub async fn touch_activity(&self, user_id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_activity = $2 WHERE id = $1")
            .bind(user_id)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to touch activity", e)
            })?;
        Ok(())
    }

    /// Users whose stored status claims presence but who have zero
    /// active sessions. The key drift signal for the health check.
    pub async fn find_present_without_sessions(&self) -> AppResult<Vec<Uuid>> {
        sqlx::query_scalar(
            "SELECT u.id FROM users u \
             WHERE u.online_status <> 'offline' \
             AND NOT EXISTS (SELECT 1 FROM sessions s WHERE s.user_id = u.id AND s.is_active)",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find inconsistent users", e)
        })
    }

    /// Force the given users offline. Explicit repair action only;
    /// never called from the health check itself.
    pub async fn force_offline(&self, user_ids: &[Uuid]) -> AppResult<u64> {
        let result = sqlx::query("UPDATE users SET online_status = 'offline' WHERE id = ANY($1)")
            .bind(user_ids)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to force users offline", e)
            })?;

        Ok(result.rows_affected())
    }
}
