use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use trivia_core::Clock;

use crate::session_table::SessionTable;
use crate::user_locks::UserLocks;

/// Recurring job that abandons sessions idle strictly longer than the
/// timeout.
///
/// Sweeping only ever touches the session table: a timed-out question is not
/// scored and stays eligible for future selection, exactly like a skip.
pub struct Sweeper {
    clock: Clock,
    sessions: Arc<SessionTable>,
    locks: Arc<UserLocks>,
    timeout: Duration,
}

impl Sweeper {
    #[must_use]
    pub fn new(
        clock: Clock,
        sessions: Arc<SessionTable>,
        locks: Arc<UserLocks>,
        timeout: Duration,
    ) -> Self {
        Self {
            clock,
            sessions,
            locks,
            timeout,
        }
    }

    /// One sweep pass; returns how many sessions were evicted.
    ///
    /// Users whose operation lock is held are skipped this pass and picked up
    /// on a later tick, so the sweep never stalls behind an in-flight
    /// operation.
    pub fn sweep_once(&self) -> usize {
        let now = self.clock.now();
        let mut evicted = 0;

        for (user_id, session) in self.sessions.list() {
            if !session.is_expired(now, self.timeout) {
                continue;
            }

            let Some(_guard) = self.locks.try_lock(user_id) else {
                debug!(user = user_id.value(), "sweep deferred, operation in flight");
                continue;
            };

            // Re-check under the lock: the user may have acted since the
            // snapshot was taken.
            let still_expired = self
                .sessions
                .get(user_id)
                .is_some_and(|s| s.is_expired(now, self.timeout));
            if still_expired {
                self.sessions.remove(user_id);
                info!(
                    user = user_id.value(),
                    question = session.question_id().value(),
                    "session timed out"
                );
                evicted += 1;
            }
        }

        evicted
    }

    /// Run `sweep_once` on `interval` until the returned handle is shut down.
    pub fn spawn(self, interval: StdDuration) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Cancellable handle for the recurring sweep task.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the schedule and wait for any in-flight pass to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}
