//! Ready-made tasks that only wait.
//!
//! Used by the demo binary and as stand-ins for real work in tests.

use std::time::Duration;

use crate::task::{ClosureTask, Outcome, Priority};

impl ClosureTask {
    /// A task that sleeps for `duration`, or until aborted.
    pub fn sleeping(priority: Priority, duration: Duration) -> Self {
        ClosureTask::new(priority, move |signal| async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => Outcome::Succeeded,
                _ = signal.aborted() => Outcome::Aborted,
            }
        })
    }

    /// A task that runs until it is aborted.
    pub fn until_aborted(priority: Priority) -> Self {
        ClosureTask::new(priority, |signal| async move {
            signal.aborted().await;
            Outcome::Aborted
        })
    }
}
