//! Named scheduler registry.
//!
//! Applications that need several independent queues (e.g. one per API host)
//! own a registry explicitly instead of relying on process-wide instances.

use std::collections::HashMap;

use futures::future::join_all;

use crate::error::{Result, TaskgateError};
use crate::scheduler::queue::{Scheduler, SchedulerConfig, SchedulerSnapshot};

/// Map from queue name to scheduler.
#[derive(Debug, Default)]
pub struct SchedulerRegistry {
    queues: HashMap<String, Scheduler>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry with one scheduler per config entry.
    pub fn from_configs<'a, I>(configs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a SchedulerConfig)>,
    {
        let mut registry = Self::new();
        for (name, config) in configs {
            registry.register(Scheduler::with_config(name.clone(), config)?)?;
        }
        Ok(registry)
    }

    /// Add a scheduler under its own name.
    pub fn register(&mut self, scheduler: Scheduler) -> Result<()> {
        let name = scheduler.name().to_string();
        if self.queues.contains_key(&name) {
            return Err(TaskgateError::DuplicateQueue(name));
        }
        tracing::debug!(queue = %name, max_concurrency = scheduler.max_concurrency(), "Queue registered");
        self.queues.insert(name, scheduler);
        Ok(())
    }

    /// Get a registered scheduler.
    pub fn get(&self, name: &str) -> Result<Scheduler> {
        self.queues
            .get(name)
            .cloned()
            .ok_or_else(|| TaskgateError::QueueNotFound(name.to_string()))
    }

    /// Get a scheduler, creating it from `config` on first use.
    pub fn get_or_create(&mut self, name: &str, config: &SchedulerConfig) -> Result<Scheduler> {
        if let Some(scheduler) = self.queues.get(name) {
            return Ok(scheduler.clone());
        }
        let scheduler = Scheduler::with_config(name, config)?;
        self.register(scheduler.clone())?;
        Ok(scheduler)
    }

    /// Remove a scheduler from the registry.
    ///
    /// Tasks already submitted keep running; the caller owns the returned handle.
    pub fn remove(&mut self, name: &str) -> Option<Scheduler> {
        self.queues.remove(name)
    }

    /// Registered queue names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Snapshots of all queues, sorted by name.
    pub fn snapshots(&self) -> Vec<SchedulerSnapshot> {
        let mut snapshots: Vec<SchedulerSnapshot> = self.queues.values().map(Scheduler::snapshot).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Abort every task in every queue. Returns the number of tasks targeted.
    pub async fn abort_all(&self) -> usize {
        join_all(self.queues.values().map(|scheduler| scheduler.abort_all()))
            .await
            .into_iter()
            .sum()
    }
}
