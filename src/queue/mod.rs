//! Scheduler
//!
//! Tasks live in one sorted set per priority tier, keyed
//! `"{queue_name}:{priority}"` and scored by due time in Unix seconds.
//! Claiming reads the earliest due member of each tier in claim order and
//! then removes exactly that member; only a successful removal grants
//! ownership.

use crate::storage::StoreAdapter;
use crate::task::{NewTask, Priority, Task};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

/// Writes tasks into priority partitions and claims due tasks
#[derive(Clone)]
pub struct Scheduler {
    store: Arc<dyn StoreAdapter>,
    queue_name: String,
}

/// Partition score for a due time, in Unix seconds with millisecond precision
pub fn score_for(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

impl Scheduler {
    /// Create a scheduler over `store` for the queue named `queue_name`
    pub fn new(store: Arc<dyn StoreAdapter>, queue_name: impl Into<String>) -> Self {
        Self {
            store,
            queue_name: queue_name.into(),
        }
    }

    /// Name of the queue whose partitions this scheduler manages
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Store key of the partition for `priority`
    pub fn partition_key(&self, priority: Priority) -> String {
        format!("{}:{}", self.queue_name, priority.as_str())
    }

    /// Enqueue a task that is due immediately
    pub async fn enqueue<T: Serialize + ?Sized>(
        &self,
        name: &str,
        payload: &T,
        priority: Priority,
        max_retries: u32,
    ) -> crate::Result<String> {
        let new_task = NewTask::new(name, payload)?
            .with_priority(priority)
            .with_max_retries(max_retries);
        self.submit(new_task).await
    }

    /// Enqueue a task that becomes due at `run_at`
    pub async fn schedule<T: Serialize + ?Sized>(
        &self,
        name: &str,
        payload: &T,
        priority: Priority,
        max_retries: u32,
        run_at: DateTime<Utc>,
    ) -> crate::Result<String> {
        let new_task = NewTask::new(name, payload)?
            .with_priority(priority)
            .with_max_retries(max_retries)
            .schedule_at(run_at);
        self.submit(new_task).await
    }

    /// Assign an id to `new_task` and write it to its partition.
    ///
    /// One store write; failures are returned unchanged. A per-task
    /// deadline under one millisecond is rejected before anything is written.
    pub async fn submit(&self, new_task: NewTask) -> crate::Result<String> {
        if new_task
            .timeout
            .is_some_and(|t| t < std::time::Duration::from_millis(1))
        {
            return Err(crate::TaskQueueError::InvalidTask(format!(
                "timeout for {} must be at least 1ms",
                new_task.name
            )));
        }

        let task = Task::from_new(&new_task);
        let body = task.to_bytes()?;
        let due_at = new_task.run_at.unwrap_or_else(Utc::now);
        let key = self.partition_key(task.priority);

        self.store.zadd(&key, score_for(due_at), &body).await?;

        debug!(
            task_id = %task.id,
            name = %task.name,
            partition = %key,
            due_at = %due_at,
            "Task enqueued"
        );
        Ok(task.id)
    }

    /// Claim the most-due task across tiers.
    ///
    /// Tiers are checked strictly in [`Priority::ALL`] order, so a due low
    /// task is never returned while a high task is due. Returns `Ok(None)`
    /// when nothing is due, and also when another claimant removed the
    /// candidate first; the caller's poll loop retries.
    ///
    /// A candidate that cannot be decoded has already been removed when the
    /// error is returned, so it is not handed out again.
    pub async fn claim(&self) -> crate::Result<Option<Task>> {
        let now = score_for(Utc::now());

        for priority in Priority::ALL {
            let key = self.partition_key(priority);
            let candidates = self
                .store
                .zrange_by_score(&key, f64::NEG_INFINITY, now, 1)
                .await?;

            let Some(member) = candidates.into_iter().next() else {
                continue;
            };

            let removed = self.store.zrem(&key, &member).await?;
            if removed == 0 {
                debug!(partition = %key, "Candidate claimed by another worker");
                return Ok(None);
            }

            return match Task::from_bytes(&member) {
                Ok(task) => {
                    debug!(task_id = %task.id, partition = %key, "Task claimed");
                    Ok(Some(task))
                }
                Err(e) => {
                    error!(
                        partition = %key,
                        record = %String::from_utf8_lossy(&member),
                        "Discarding corrupt task record: {}",
                        e
                    );
                    Err(e)
                }
            };
        }

        Ok(None)
    }

    /// Number of records stored in the `priority` partition, due or not
    pub async fn pending(&self, priority: Priority) -> crate::Result<u64> {
        self.store.zcard(&self.partition_key(priority)).await
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("queue_name", &self.queue_name)
            .finish()
    }
}
