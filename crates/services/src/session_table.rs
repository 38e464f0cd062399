use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;

use trivia_core::model::{ActiveSession, UserId};

/// Rejected attempt to install a session for a user that already has one.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("session already exists for user {user_id}")]
pub struct SessionConflict {
    pub user_id: UserId,
}

/// In-memory table of in-flight questions, at most one per user.
///
/// Process-lifetime only; nothing here survives a restart. The lifecycle
/// controller and the sweeper are the only mutators.
#[derive(Debug, Default)]
pub struct SessionTable {
    inner: Mutex<HashMap<UserId, ActiveSession>>,
}

impl SessionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<UserId, ActiveSession>> {
        // Sessions stay usable even if a holder panicked mid-access.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self, user_id: UserId) -> Option<ActiveSession> {
        self.guard().get(&user_id).cloned()
    }

    /// Install a session for the user.
    ///
    /// # Errors
    ///
    /// Returns `SessionConflict` if one already exists; the existing session
    /// is left untouched.
    pub fn put(&self, user_id: UserId, session: ActiveSession) -> Result<(), SessionConflict> {
        match self.guard().entry(user_id) {
            std::collections::hash_map::Entry::Occupied(_) => Err(SessionConflict { user_id }),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    pub fn remove(&self, user_id: UserId) -> Option<ActiveSession> {
        self.guard().remove(&user_id)
    }

    /// Refresh the user's activity timestamp. Returns false when no session
    /// exists.
    pub fn touch(&self, user_id: UserId, now: DateTime<Utc>) -> bool {
        match self.guard().get_mut(&user_id) {
            Some(session) => {
                session.touch(now);
                true
            }
            None => false,
        }
    }

    /// Snapshot of all sessions, for sweeping.
    #[must_use]
    pub fn list(&self) -> Vec<(UserId, ActiveSession)> {
        self.guard()
            .iter()
            .map(|(user_id, session)| (*user_id, session.clone()))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}
