/// Task execution with deadlines and retry backoff
pub mod executor;
/// Handler trait and registry
pub mod handler;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Priority tiers; each tier is stored in its own partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Claimed before any other tier
    High,
    /// Default tier
    #[default]
    Medium,
    /// Claimed only when no higher tier has a due task
    Low,
}

impl Priority {
    /// Tiers in claim order
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    /// Partition suffix for this tier
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque JSON payload, carried byte-for-byte between producer and handler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Box<RawValue>);

impl Payload {
    /// Serialize a value into a payload
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> crate::Result<Self> {
        Ok(Self(serde_json::value::to_raw_value(value)?))
    }

    /// Wrap already-serialized JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        Ok(Self(serde_json::from_slice(bytes)?))
    }

    /// Deserialize the payload into a concrete type
    pub fn decode<T: DeserializeOwned>(&self) -> crate::Result<T> {
        Ok(serde_json::from_str(self.0.get())?)
    }

    /// Raw JSON bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.0.get().as_bytes()
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.0.get() == other.0.get()
    }
}

impl Eq for Payload {}

/// A task record as stored in a partition.
///
/// The record is immutable once enqueued. Its due time is the partition
/// score and is not part of the serialized body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    pub id: String,

    /// Handler name
    pub name: String,

    /// Opaque handler input
    pub payload: Payload,

    /// Priority tier the record is stored under
    pub priority: Priority,

    /// Retry ceiling; total attempts never exceed `max_retries + 1`
    pub max_retries: u32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Per-task handler deadline in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Task {
    /// Build a fresh record from a submission, assigning a new id
    pub fn from_new(new_task: &NewTask) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: new_task.name.clone(),
            payload: new_task.payload.clone(),
            priority: new_task.priority,
            max_retries: new_task.max_retries,
            created_at: Utc::now(),
            timeout_ms: new_task
                .timeout
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    /// Handler deadline set on this task, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Serialize the record body stored in the partition
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize a record body read from a partition
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A task submission, before it is assigned an id and written to the store
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Handler name
    pub name: String,

    /// Opaque handler input
    pub payload: Payload,

    /// Priority tier
    pub priority: Priority,

    /// Retry ceiling
    pub max_retries: u32,

    /// When the task becomes due; `None` means now
    pub run_at: Option<DateTime<Utc>>,

    /// Per-task handler deadline
    pub timeout: Option<Duration>,
}

impl NewTask {
    /// Create a submission with default priority and retry budget
    pub fn new<T: Serialize + ?Sized>(name: impl Into<String>, payload: &T) -> crate::Result<Self> {
        Ok(Self::with_payload(name, Payload::encode(payload)?))
    }

    /// Create a submission from an already encoded payload
    pub fn with_payload(name: impl Into<String>, payload: Payload) -> Self {
        Self {
            name: name.into(),
            payload,
            priority: Priority::default(),
            max_retries: 3,
            run_at: None,
            timeout: None,
        }
    }

    /// Set the priority tier
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the maximum retry attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Make the task due at a specific time
    pub fn schedule_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = Some(run_at);
        self
    }

    /// Make the task due after a delay from now
    pub fn schedule_after(mut self, delay: chrono::Duration) -> Self {
        self.run_at = Some(Utc::now() + delay);
        self
    }

    /// Bound each handler attempt by a deadline.
    ///
    /// The deadline must be at least one millisecond;
    /// [`crate::Scheduler::submit`] rejects anything shorter.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

const SUCCESS: &str = "success";
const FAILED_PREFIX: &str = "failed: max retries exceeded: ";
const UNHANDLED_PREFIX: &str = "unhandled: no handler registered for ";

/// Terminal outcome of a claimed task's attempt chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// A handler attempt succeeded
    Success,

    /// Every attempt failed; carries the last error
    Failed {
        /// Error message of the final attempt
        error: String,
    },

    /// No handler was registered for the task name
    Unhandled {
        /// Task name that had no handler
        name: String,
    },
}

impl TaskOutcome {
    /// Parse the stored string form back into an outcome
    pub fn parse(value: &str) -> Option<Self> {
        if value == SUCCESS {
            Some(TaskOutcome::Success)
        } else if let Some(error) = value.strip_prefix(FAILED_PREFIX) {
            Some(TaskOutcome::Failed {
                error: error.to_string(),
            })
        } else {
            value
                .strip_prefix(UNHANDLED_PREFIX)
                .map(|name| TaskOutcome::Unhandled {
                    name: name.to_string(),
                })
        }
    }

    /// Whether the outcome is a success
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Success => f.write_str(SUCCESS),
            TaskOutcome::Failed { error } => write!(f, "{FAILED_PREFIX}{error}"),
            TaskOutcome::Unhandled { name } => write!(f, "{UNHANDLED_PREFIX}{name}"),
        }
    }
}
