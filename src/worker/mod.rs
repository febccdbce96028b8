/// Worker pool implementation
pub mod pool;
/// Result persistence
pub mod results;

use crate::queue::Scheduler;
use crate::task::executor::{HandlerExecutor, RetryPolicy};
use crate::task::handler::HandlerRegistry;
use crate::task::{Task, TaskOutcome};
use crate::worker::results::ResultBackend;
use crate::TaskQueueError;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A worker that claims tasks and drives their attempt chains
#[derive(Clone)]
pub struct Worker {
    id: usize,
    scheduler: Scheduler,
    results: ResultBackend,
    registry: Arc<HandlerRegistry>,
    executor: HandlerExecutor,
    retry: RetryPolicy,
    poll_interval: Duration,
}

impl Worker {
    /// Create a new worker with the given ID
    pub fn new(
        id: usize,
        scheduler: Scheduler,
        results: ResultBackend,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            id,
            scheduler,
            results,
            registry,
            executor: HandlerExecutor::default(),
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Use a custom executor
    pub fn with_executor(mut self, executor: HandlerExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Use a custom retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Idle wait between polls of an empty queue
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Same configuration under a different ID
    pub fn with_id(mut self, id: usize) -> Self {
        self.id = id;
        self
    }

    /// Worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Claim and process tasks until `cancel` fires.
    ///
    /// Store errors are logged and the loop keeps polling.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(worker_id = self.id, "Worker started");

        while !cancel.is_cancelled() {
            match self.scheduler.claim().await {
                Ok(Some(task)) => {
                    info!(worker_id = self.id, task_id = %task.id, name = %task.name, "Processing task");
                    self.process(task, &cancel).await;
                }
                Ok(None) => {
                    if !self.idle(&cancel).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(worker_id = self.id, "Error claiming task: {}", e);
                    if !self.idle(&cancel).await {
                        break;
                    }
                }
            }
        }

        info!(worker_id = self.id, "Worker stopped");
    }

    /// Wait one poll interval; `false` if cancelled first
    async fn idle(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = sleep(self.poll_interval) => true,
            _ = cancel.cancelled() => false,
        }
    }

    /// Run the attempt chain for a claimed task and record its outcome.
    ///
    /// Makes at most `max_retries + 1` handler attempts. Returns the recorded
    /// outcome, or `None` if cancellation interrupted a backoff, in which
    /// case nothing is recorded.
    pub async fn process(&self, task: Task, cancel: &CancellationToken) -> Option<TaskOutcome> {
        let Some(handler) = self.registry.get(&task.name) else {
            warn!(worker_id = self.id, task_id = %task.id, name = %task.name, "No handler for task");
            let outcome = TaskOutcome::Unhandled {
                name: task.name.clone(),
            };
            self.record(&task, &outcome).await;
            return Some(outcome);
        };

        let mut attempt: u32 = 0;
        loop {
            let err = match self.executor.execute(handler.as_ref(), &task).await {
                Ok(()) => {
                    info!(worker_id = self.id, task_id = %task.id, attempt = attempt + 1, "Task completed successfully");
                    let outcome = TaskOutcome::Success;
                    self.record(&task, &outcome).await;
                    return Some(outcome);
                }
                Err(e) => e,
            };

            warn!(
                worker_id = self.id,
                task_id = %task.id,
                attempt = attempt + 1,
                "Task attempt failed: {}",
                err
            );

            if attempt >= task.max_retries {
                warn!(worker_id = self.id, task_id = %task.id, "Task failed after max retries");
                let outcome = TaskOutcome::Failed {
                    error: failure_reason(err),
                };
                self.record(&task, &outcome).await;
                return Some(outcome);
            }

            let backoff = self.retry.backoff(attempt);
            info!(worker_id = self.id, task_id = %task.id, ?backoff, "Retrying task after backoff");
            tokio::select! {
                _ = sleep(backoff) => {}
                _ = cancel.cancelled() => {
                    warn!(
                        worker_id = self.id,
                        task_id = %task.id,
                        attempt = attempt + 1,
                        "Shutdown during backoff, abandoning task"
                    );
                    return None;
                }
            }
            attempt += 1;
        }
    }

    async fn record(&self, task: &Task, outcome: &TaskOutcome) {
        if let Err(e) = self.results.store_outcome(&task.id, outcome).await {
            error!(worker_id = self.id, task_id = %task.id, "Failed to store result: {}", e);
        }
    }
}

/// Message stored for a failure: the handler's own text, or the error display
fn failure_reason(err: TaskQueueError) -> String {
    match err {
        TaskQueueError::Handler(msg) => msg,
        other => other.to_string(),
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("scheduler", &self.scheduler)
            .field("retry", &self.retry)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}
