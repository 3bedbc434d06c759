//! Observer lookup collaborator contract.

use async_trait::async_trait;
use uuid::Uuid;

use khidma_core::result::AppResult;

/// Resolves which users are permitted to receive a subject's presence
/// broadcasts (e.g. active conversation partners).
///
/// Supplied by the marketplace's relationship layer; this subsystem
/// treats it as an opaque query per broadcast. A failed lookup must be
/// treated as "no observers" by callers (fail closed), never as
/// "everyone".
#[async_trait]
pub trait ObserverLookup: Send + Sync + std::fmt::Debug {
    /// Return the user IDs currently allowed to observe `user_id`.
    async fn observers_of(&self, user_id: Uuid) -> AppResult<Vec<Uuid>>;
}

/// Fixed observer set, used in tests and as a standalone default.
#[derive(Debug, Default)]
pub struct StaticObserverLookup {
    observers: Vec<Uuid>,
}

impl StaticObserverLookup {
    /// Create a lookup that always returns the given observer set.
    pub fn new(observers: Vec<Uuid>) -> Self {
        Self { observers }
    }
}

#[async_trait]
impl ObserverLookup for StaticObserverLookup {
    async fn observers_of(&self, _user_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self.observers.clone())
    }
}
