//! Caller-side view of a submitted task.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::scheduler::heap::Handle;
use crate::scheduler::priority::Priority;
use crate::task::Outcome;

/// Identifier of a task within one scheduler.
pub type TaskId = Handle;

/// Where a task is in the scheduler's lifecycle.
///
/// `Waiting -> Running -> Finished`, or `Waiting -> Cancelled` when the task is
/// aborted before it was ever admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TaskState {
    Waiting,
    Running,
    Finished { outcome: Outcome },
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Finished { .. } | TaskState::Cancelled)
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            TaskState::Finished { outcome } => Some(outcome),
            _ => None,
        }
    }
}

/// Completion handle returned by [`Scheduler::submit`](crate::scheduler::Scheduler::submit).
///
/// Dropping the handle does not affect the task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    priority: Priority,
    state: watch::Receiver<TaskState>,
}

impl TaskHandle {
    pub(crate) fn new(id: TaskId, priority: Priority, state: watch::Receiver<TaskState>) -> Self {
        Self { id, priority, state }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    /// Wait until the task reaches a terminal state and return it.
    pub async fn wait(&self) -> TaskState {
        let mut rx = self.state.clone();
        let terminal = rx.wait_for(TaskState::is_terminal).await.map(|state| state.clone());
        match terminal {
            Ok(state) => state,
            // Scheduler side went away; report the last thing it published.
            Err(_) => rx.borrow().clone(),
        }
    }
}
