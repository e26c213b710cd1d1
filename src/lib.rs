//! Taskgate - a priority task scheduler with bounded concurrency
//!
//! Taskgate runs asynchronous, abortable tasks so that at most N of them execute
//! at once, and higher-priority tasks are admitted before lower-priority ones.

pub mod error;
pub mod scheduler;
pub mod task;

pub use error::{Result, TaskgateError};
pub use scheduler::{Priority, Scheduler, SchedulerConfig, SchedulerEvent, TaskHandle, TaskId, TaskState};
pub use task::{AbortSignal, ClosureTask, Outcome, Task};
