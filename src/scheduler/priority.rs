//! Priority ordering for task admission.
//!
//! Tasks are ranked by:
//! - Priority level (high > medium > low)
//! - Insertion order among equal levels (earlier first)

use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TaskgateError;

/// Ordinal values by level.
/// Higher = more important = runs first.
pub const PRIORITY_HIGH: i32 = 10;
pub const PRIORITY_MEDIUM: i32 = 5;
pub const PRIORITY_LOW: i32 = 0;

/// Execution priority of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Get the ordinal value used to compare two levels.
    pub fn value(self) -> i32 {
        match self {
            Priority::High => PRIORITY_HIGH,
            Priority::Medium => PRIORITY_MEDIUM,
            Priority::Low => PRIORITY_LOW,
        }
    }

    /// All levels, highest first.
    pub fn all() -> [Priority; 3] {
        [Priority::High, Priority::Medium, Priority::Low]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value().cmp(&other.value())
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TaskgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Priority::High),
            "medium" | "m" => Ok(Priority::Medium),
            "low" | "l" => Ok(Priority::Low),
            _ => Err(TaskgateError::InvalidPriority(s.to_string())),
        }
    }
}

/// Heap key: priority first, then the earlier insertion.
///
/// `order` is a monotonically increasing insertion counter; wrapping it in
/// `Reverse` makes the older entry compare greater, so equal priorities drain FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Rank<P> {
    priority: P,
    order: Reverse<u64>,
}

impl<P: Ord> Rank<P> {
    pub(crate) fn new(priority: P, order: u64) -> Self {
        Self {
            priority,
            order: Reverse(order),
        }
    }

    pub(crate) fn priority(&self) -> &P {
        &self.priority
    }
}
