//! taskq - A distributed task queue with priority partitions and retrying workers
//!
//! Producers enqueue named tasks into priority-partitioned, time-ordered
//! partitions of a shared store. Workers claim the most-due task across
//! priority tiers, run the registered handler, retry with exponential backoff
//! and record a terminal outcome in a result store.

/// Configuration management for the task queue system
pub mod config;
/// Scheduler that writes and claims tasks
pub mod queue;
/// Store adapters for partitions and results
pub mod storage;
/// Task definitions, handlers and execution logic
pub mod task;
/// Worker pool and worker management
pub mod worker;

pub use config::Config;
pub use queue::Scheduler;
pub use storage::backend::MemoryStore;
pub use task::{NewTask, Payload, Priority, Task, TaskOutcome};
pub use worker::pool::WorkerPool;
pub use worker::results::ResultBackend;

use std::time::Duration;
use thiserror::Error;

/// Result type for task queue operations
pub type Result<T> = std::result::Result<T, TaskQueueError>;

/// Error types for the task queue system
#[derive(Error, Debug)]
pub enum TaskQueueError {
    /// Payload or task record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport or availability fault in the backing store
    #[error("Store error: {0}")]
    Store(String),

    /// A task handler reported a failure
    #[error("Handler error: {0}")]
    Handler(String),

    /// A task handler ran past its deadline
    #[error("Handler timed out after {0:?}")]
    Timeout(Duration),

    /// No handler is registered for the claimed task's name
    #[error("No handler registered for task: {0}")]
    UnregisteredHandler(String),

    /// A submission was rejected before reaching the store
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// Worker pool encountered an error
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for TaskQueueError {
    fn from(err: redis::RedisError) -> Self {
        TaskQueueError::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let err = TaskQueueError::Store("connection refused".to_string());
        assert_eq!(err.to_string(), "Store error: connection refused");

        let err = TaskQueueError::UnregisteredHandler("send_email".to_string());
        assert_eq!(err.to_string(), "No handler registered for task: send_email");

        let err = TaskQueueError::Timeout(Duration::from_secs(2));
        assert_eq!(err.to_string(), "Handler timed out after 2s");
    }

    #[test]
    fn test_serialization_error_converts() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: TaskQueueError = json_err.into();
        assert!(matches!(err, TaskQueueError::Serialization(_)));
    }
}
