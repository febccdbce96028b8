//! Executor

use crate::task::handler::TaskHandler;
use crate::task::Task;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs single handler attempts under a deadline
#[derive(Debug, Clone)]
pub struct HandlerExecutor {
    default_timeout: Duration,
}

impl HandlerExecutor {
    /// Create an executor whose deadline applies when a task sets none
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    /// Deadline for one attempt of `task`
    pub fn deadline_for(&self, task: &Task) -> Duration {
        task.timeout().unwrap_or(self.default_timeout)
    }

    /// Run one attempt of `task` through `handler`.
    ///
    /// A handler failure becomes [`crate::TaskQueueError::Handler`]; running
    /// past the deadline becomes [`crate::TaskQueueError::Timeout`]. Both feed
    /// the same retry logic.
    pub async fn execute(&self, handler: &dyn TaskHandler, task: &Task) -> crate::Result<()> {
        let deadline = self.deadline_for(task);

        match timeout(deadline, handler.handle(&task.payload)).await {
            Ok(Ok(())) => {
                debug!(task_id = %task.id, "Handler attempt succeeded");
                Ok(())
            }
            Ok(Err(e)) => Err(crate::TaskQueueError::Handler(e)),
            Err(_) => {
                warn!(task_id = %task.id, ?deadline, "Handler attempt timed out");
                Err(crate::TaskQueueError::Timeout(deadline))
            }
        }
    }
}

impl Default for HandlerExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

/// Exponential backoff between attempts: `unit * 2^(attempt + 1)`.
///
/// No jitter and no cap; the product saturates instead of overflowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    unit: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given time unit
    pub fn new(unit: Duration) -> Self {
        Self { unit }
    }

    /// Delay before retrying after failed attempt number `attempt` (0-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_add(1));
        self.unit.saturating_mul(factor)
    }

    /// Time unit the exponent is applied to
    pub fn unit(&self) -> Duration {
        self.unit
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
