//! Notification seam between maintenance tasks and the real-time
//! layer.

use async_trait::async_trait;
use uuid::Uuid;

/// Receives presence transitions decided by maintenance tasks.
///
/// The sweep and the repair task change presence from outside any
/// connection, so the real-time layer has to be told to fan the change
/// out. Implementations must tolerate being called for users with no
/// connected observers.
#[async_trait]
pub trait PresenceNotifier: Send + Sync + std::fmt::Debug {
    /// A maintenance task concluded the user is offline.
    async fn user_went_offline(&self, user_id: Uuid);
}

/// No-op notifier for standalone and test use.
#[derive(Debug, Default)]
pub struct NullNotifier;

#[async_trait]
impl PresenceNotifier for NullNotifier {
    async fn user_went_offline(&self, _user_id: Uuid) {}
}
