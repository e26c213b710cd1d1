//! Error types for Taskgate
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Taskgate
#[derive(Debug, Error)]
pub enum TaskgateError {
    /// A scheduler needs at least one execution slot
    #[error("Invalid concurrency limit: {0}")]
    InvalidConcurrency(usize),

    /// Tasks can only be admitted from inside a tokio runtime
    #[error("No async runtime: {0}")]
    NoRuntime(String),

    /// Priority level could not be parsed
    #[error("Invalid priority: {0}")]
    InvalidPriority(String),

    /// Named queue not present in the registry
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// Named queue registered twice
    #[error("Queue already registered: {0}")]
    DuplicateQueue(String),
}

/// Result type alias for Taskgate operations
pub type Result<T> = std::result::Result<T, TaskgateError>;
