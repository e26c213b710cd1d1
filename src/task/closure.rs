//! Closure-backed cooperative task.

use std::future::Future;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;

use crate::task::{AbortSignal, Outcome, Priority, Task};

type Body = Box<dyn Fn(AbortSignal) -> BoxFuture<'static, Outcome> + Send + Sync>;

/// A [`Task`] whose work is an async closure.
///
/// The closure receives the task's [`AbortSignal`] and is expected to stop soon
/// after it is raised. The task tracks the executing/aborted flags so the body
/// does not have to.
pub struct ClosureTask {
    label: String,
    priority: Priority,
    body: Body,
    signal: AbortSignal,
    executing: watch::Sender<bool>,
}

impl ClosureTask {
    pub fn new<F, Fut>(priority: Priority, body: F) -> Self
    where
        F: Fn(AbortSignal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Outcome> + Send + 'static,
    {
        let (executing, _rx) = watch::channel(false);
        Self {
            label: "task".to_string(),
            priority,
            body: Box::new(move |signal| body(signal).boxed()),
            signal: AbortSignal::new(),
            executing,
        }
    }

    /// Set the name used in log lines.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// The signal handed to the body.
    pub fn signal(&self) -> &AbortSignal {
        &self.signal
    }
}

/// Clears the executing flag even if the body panics.
struct ExecutingGuard<'a>(&'a watch::Sender<bool>);

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

#[async_trait]
impl Task for ClosureTask {
    fn priority(&self) -> Priority {
        self.priority
    }

    async fn run(&self) -> Outcome {
        // Mark executing before checking the signal so a concurrent abort either
        // sees us running and waits, or we see its signal and skip the body.
        self.executing.send_replace(true);
        let _guard = ExecutingGuard(&self.executing);

        if self.signal.is_aborted() {
            return Outcome::Aborted;
        }

        (self.body)(self.signal.clone()).await
    }

    async fn abort(&self) {
        if self.signal.trigger() {
            tracing::debug!(task = %self.label, "Abort requested");
        }

        let mut rx = self.executing.subscribe();
        let _ = rx.wait_for(|executing| !*executing).await;
    }

    fn is_executing(&self) -> bool {
        *self.executing.borrow()
    }

    fn is_aborted(&self) -> bool {
        self.signal.is_aborted()
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for ClosureTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureTask")
            .field("label", &self.label)
            .field("priority", &self.priority)
            .field("executing", &self.is_executing())
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
