use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use trivia_core::model::UserId;

/// Registry of per-user operation locks.
///
/// Controller operations hold a user's lock for their full duration, so
/// check-then-act sequences on the session table stay atomic per user even
/// across store round trips. The sweeper only ever `try_lock`s.
#[derive(Debug, Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<UserId, Arc<AsyncMutex<()>>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, user_id: UserId) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.guard()
                .entry(user_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Wait for exclusive access to the user's lifecycle operations.
    pub async fn lock(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        self.entry(user_id).lock_owned().await
    }

    /// Non-blocking acquisition; `None` while an operation is in flight.
    #[must_use]
    pub fn try_lock(&self, user_id: UserId) -> Option<OwnedMutexGuard<()>> {
        self.entry(user_id).try_lock_owned().ok()
    }
}
