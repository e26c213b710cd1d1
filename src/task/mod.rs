//! Task contract consumed by the scheduler.
//!
//! The scheduler treats a task as an opaque unit of work that exposes:
//! - a fixed [`Priority`]
//! - an asynchronous `run` that reports an [`Outcome`]
//! - an asynchronous, idempotent, cooperative `abort`
//!
//! What a task actually does (HTTP calls, parsing, ...) and how it reports its
//! own results is up to the implementation. [`ClosureTask`] composes arbitrary
//! async bodies over this contract.

mod closure;
mod signal;
mod sleep;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::scheduler::Priority;
pub use closure::ClosureTask;
pub use signal::AbortSignal;

/// How a task's run ended, as reported by the task itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum Outcome {
    /// Work finished normally.
    Succeeded,
    /// Work ended with an error the task chose to report.
    Failed(String),
    /// Work stopped because it observed an abort request.
    Aborted,
}

impl Outcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Outcome::Failed(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }
}

/// Capability set the scheduler needs from a unit of work.
///
/// Abort is cooperative: `abort` asks the running body to stop and resolves
/// once it has. Aborting a task that never ran, or that already finished, must
/// return promptly.
#[async_trait]
pub trait Task: Send + Sync {
    /// Admission priority; must not change while the task is queued.
    fn priority(&self) -> Priority;

    /// Execute the task to completion.
    async fn run(&self) -> Outcome;

    /// Request a stop and wait until the task no longer executes.
    async fn abort(&self);

    /// Whether the task body is currently executing.
    fn is_executing(&self) -> bool;

    /// Whether an abort has been requested.
    fn is_aborted(&self) -> bool;

    /// Short name used in log lines.
    fn label(&self) -> &str {
        "task"
    }
}
