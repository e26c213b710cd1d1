//! Concurrency-gated priority scheduler.
//!
//! The Scheduler admits waiting tasks in priority order while at most
//! `max_concurrency` of them execute:
//! - `submit` queues a task and runs an admission pass
//! - each finished task releases its permit and runs another admission pass
//! - there is no background poller; admission only reacts to these two events
//!
//! The waiting heap and the running set live behind one mutex so counts,
//! admission decisions and lifecycle events are always consistent. Permits come
//! from a semaphore that is only ever polled with `try_acquire`, so no one
//! waits for a permit while holding the lock.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, broadcast, watch};

use crate::error::{Result, TaskgateError};
use crate::scheduler::handle::{TaskHandle, TaskId, TaskState};
use crate::scheduler::heap::{DEFAULT_CAPACITY, IndexedHeap};
use crate::scheduler::priority::Priority;
use crate::task::{Outcome, Task};

/// Default number of tasks allowed to execute at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Capacity of the lifecycle event channel per subscriber.
const EVENT_BUFFER: usize = 64;

/// Configuration for one scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of tasks executing at once.
    pub max_concurrency: usize,
    /// Slots reserved up front in the waiting heap.
    pub initial_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            initial_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl SchedulerConfig {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency,
            ..Self::default()
        }
    }

    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

/// Lifecycle notification published by a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerEvent {
    /// The scheduler went from idle to executing its first task.
    ///
    /// Fires once per busy period. A busy period lasts until `Completed`, so
    /// the running count dropping to zero while tasks still wait and then
    /// rising again does not fire `Started` a second time.
    Started,
    /// The scheduler holds no waiting and no running tasks anymore.
    Completed,
}

/// Point-in-time counters of a scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub name: String,
    pub max_concurrency: usize,
    pub waiting: usize,
    pub running: usize,
}

/// A task the scheduler is responsible for.
struct Job {
    id: TaskId,
    priority: Priority,
    task: Arc<dyn Task>,
    state: watch::Sender<TaskState>,
}

impl Job {
    fn new(id: TaskId, priority: Priority, task: Arc<dyn Task>, state: watch::Sender<TaskState>) -> Self {
        Self {
            id,
            priority,
            task,
            state,
        }
    }

    /// Abort a running job and wait until the scheduler has retired it.
    async fn stop(&self) {
        self.task.abort().await;
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(TaskState::is_terminal).await;
    }
}

struct State {
    waiting: IndexedHeap<Priority, Arc<Job>>,
    running: HashMap<TaskId, Arc<Job>>,
    /// Set by `Started`, cleared by `Completed`.
    busy: bool,
}

struct Inner {
    name: String,
    max_concurrency: usize,
    permits: Arc<Semaphore>,
    state: Mutex<State>,
    events: broadcast::Sender<SchedulerEvent>,
}

/// Priority scheduler with bounded concurrency.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler named `default` running at most `max_concurrency` tasks.
    pub fn new(max_concurrency: usize) -> Result<Self> {
        Self::with_config("default", &SchedulerConfig::new(max_concurrency))
    }

    /// Create a named scheduler from a config.
    pub fn with_config(name: impl Into<String>, config: &SchedulerConfig) -> Result<Self> {
        if config.max_concurrency == 0 {
            return Err(TaskgateError::InvalidConcurrency(config.max_concurrency));
        }

        let (events, _rx) = broadcast::channel(EVENT_BUFFER);
        let inner = Inner {
            name: name.into(),
            max_concurrency: config.max_concurrency,
            permits: Arc::new(Semaphore::new(config.max_concurrency)),
            state: Mutex::new(State {
                waiting: IndexedHeap::with_capacity(config.initial_capacity),
                running: HashMap::new(),
                busy: false,
            }),
            events,
        };

        Ok(Self { inner: Arc::new(inner) })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency
    }

    /// Number of tasks currently executing.
    pub fn running_count(&self) -> usize {
        self.inner.lock().running.len()
    }

    /// Number of tasks waiting for a free slot.
    pub fn waiting_count(&self) -> usize {
        self.inner.lock().waiting.len()
    }

    /// Total number of tasks the scheduler is still responsible for.
    pub fn count(&self) -> usize {
        let state = self.inner.lock();
        state.waiting.len() + state.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Lifecycle state of a task, `None` once it left the scheduler.
    pub fn state_of(&self, id: TaskId) -> Option<TaskState> {
        let state = self.inner.lock();
        if state.waiting.contains(id) {
            Some(TaskState::Waiting)
        } else if state.running.contains_key(&id) {
            Some(TaskState::Running)
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let state = self.inner.lock();
        SchedulerSnapshot {
            name: self.inner.name.clone(),
            max_concurrency: self.inner.max_concurrency,
            waiting: state.waiting.len(),
            running: state.running.len(),
        }
    }

    /// Subscribe to `Started` / `Completed` notifications.
    ///
    /// Drop the receiver to unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }

    /// Queue a task and admit it right away if a slot is free.
    ///
    /// Never blocks. Must be called from within a tokio runtime.
    pub fn submit(&self, task: Arc<dyn Task>) -> Result<TaskHandle> {
        tokio::runtime::Handle::try_current().map_err(|e| TaskgateError::NoRuntime(e.to_string()))?;

        let priority = task.priority();
        let label = task.label().to_string();
        let (tx, rx) = watch::channel(TaskState::Waiting);
        let id = {
            let mut state = self.inner.lock();
            state
                .waiting
                .insert_with(priority, |id| Arc::new(Job::new(id, priority, task, tx)))
        };
        let handle = TaskHandle::new(id, priority, rx);

        tracing::debug!(
            queue = %self.inner.name,
            task_id = %handle.id(),
            task = %label,
            priority = %priority,
            "Task submitted"
        );

        self.inner.admit();
        Ok(handle)
    }

    /// Abort one task.
    ///
    /// A waiting task is removed at once and never starts. A running task is
    /// signalled and this call resolves once it stopped and its slot was
    /// released. Returns `false` if the scheduler does not hold the task
    /// (already finished, already aborted, or unknown).
    pub async fn abort(&self, id: TaskId) -> bool {
        enum Target {
            Waiting(Arc<Job>),
            Running(Arc<Job>),
        }

        let target = {
            let mut state = self.inner.lock();
            if let Some(job) = state.waiting.delete(id) {
                job.state.send_replace(TaskState::Cancelled);
                self.inner.settle(&mut state);
                Target::Waiting(job)
            } else if let Some(job) = state.running.get(&id) {
                Target::Running(job.clone())
            } else {
                return false;
            }
        };

        match target {
            Target::Waiting(job) => {
                tracing::info!(queue = %self.inner.name, task_id = %id, "Aborted waiting task");
                job.task.abort().await;
            }
            Target::Running(job) => {
                tracing::info!(queue = %self.inner.name, task_id = %id, "Aborting running task");
                job.stop().await;
            }
        }

        true
    }

    /// Abort every waiting and running task.
    ///
    /// Resolves once all of them terminated. Returns how many tasks were
    /// targeted. A running task that finishes on its own in the meantime is
    /// retired exactly once by its normal completion path.
    pub async fn abort_all(&self) -> usize {
        let (cancelled, running) = {
            let mut state = self.inner.lock();
            let cancelled = state.waiting.delete_all();
            for job in &cancelled {
                job.state.send_replace(TaskState::Cancelled);
            }
            let running: Vec<Arc<Job>> = state.running.values().cloned().collect();
            self.inner.settle(&mut state);
            (cancelled, running)
        };

        let total = cancelled.len() + running.len();
        tracing::info!(
            queue = %self.inner.name,
            waiting = cancelled.len(),
            running = running.len(),
            "Aborting all tasks"
        );

        futures::join!(
            join_all(cancelled.iter().map(|job| job.task.abort())),
            join_all(running.iter().map(|job| job.stop())),
        );

        total
    }

    /// Resolve once the scheduler holds no tasks.
    pub async fn idle(&self) {
        let mut events = self.subscribe();
        while !self.is_empty() {
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Every mutation keeps the state consistent before it can panic, so a
        // poisoned lock still guards valid data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit waiting tasks while permits are free.
    fn admit(self: &Arc<Self>) {
        loop {
            let Ok(permit) = self.permits.clone().try_acquire_owned() else {
                break;
            };

            let job = {
                let mut state = self.lock();
                let Some(job) = state.waiting.extract_max() else {
                    // Release under the lock so a concurrent submit that
                    // inserts next also finds the permit free.
                    drop(permit);
                    break;
                };
                state.running.insert(job.id, job.clone());
                job.state.send_replace(TaskState::Running);
                if !state.busy {
                    state.busy = true;
                    self.emit(SchedulerEvent::Started);
                }
                job
            };

            tracing::debug!(
                queue = %self.name,
                task_id = %job.id,
                priority = %job.priority,
                "Task admitted"
            );

            tokio::spawn(self.clone().execute(job, permit));
        }
    }

    async fn execute(self: Arc<Self>, job: Arc<Job>, permit: OwnedSemaphorePermit) {
        let outcome = match AssertUnwindSafe(job.task.run()).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(queue = %self.name, task_id = %job.id, "Task panicked");
                Outcome::failed("task panicked")
            }
        };

        tracing::debug!(
            queue = %self.name,
            task_id = %job.id,
            outcome = ?outcome,
            "Task finished"
        );

        {
            let mut state = self.lock();
            let removed = state.running.remove(&job.id);
            debug_assert!(removed.is_some(), "task {} finished but was not running", job.id);
            job.state.send_replace(TaskState::Finished { outcome });
            self.settle(&mut state);
        }

        drop(permit);
        self.admit();
    }

    /// Publish `Completed` if the last task just left.
    fn settle(&self, state: &mut State) {
        if state.busy && state.waiting.is_empty() && state.running.is_empty() {
            state.busy = false;
            self.emit(SchedulerEvent::Completed);
        }
    }

    fn emit(&self, event: SchedulerEvent) {
        tracing::info!(queue = %self.name, event = ?event, "Scheduler event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("Scheduler")
            .field("name", &snapshot.name)
            .field("max_concurrency", &snapshot.max_concurrency)
            .field("waiting", &snapshot.waiting)
            .field("running", &snapshot.running)
            .finish()
    }
}
