//! Scheduler module for priority admission and bounded concurrency.
//!
//! This module provides:
//! - **Priority ordering**: Maps priority levels to the order tasks are admitted in.
//! - **Indexed heap**: Max-heap of waiting tasks with O(log n) removal by handle.
//! - **Scheduler**: Admits the highest-priority waiting task whenever a slot frees up,
//!   and aborts waiting or running tasks on request.
//! - **Registry**: Explicitly owned map of named schedulers.
//!
//! # Architecture
//!
//! The scheduler is event driven:
//! 1. `submit` inserts the task into the waiting heap and tries to admit
//! 2. An admitted task moves to the running set and its `run` is spawned
//! 3. When `run` returns, the task leaves the running set, its permit is released
//!    and admission is tried again
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use taskgate::scheduler::{Priority, Scheduler};
//! use taskgate::task::ClosureTask;
//!
//! let scheduler = Scheduler::new(2)?;
//! let handle = scheduler.submit(Arc::new(ClosureTask::until_aborted(Priority::High)))?;
//! scheduler.abort(handle.id()).await;
//! ```

mod handle;
pub mod heap;
mod priority;
mod queue;
mod registry;

pub use handle::{TaskHandle, TaskId, TaskState};
pub use heap::{DEFAULT_CAPACITY, Handle, IndexedHeap};
pub use priority::{PRIORITY_HIGH, PRIORITY_LOW, PRIORITY_MEDIUM, Priority};
pub use queue::{DEFAULT_MAX_CONCURRENCY, Scheduler, SchedulerConfig, SchedulerEvent, SchedulerSnapshot};
pub use registry::SchedulerRegistry;
