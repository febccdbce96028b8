//! Outcome persistence keyed by task id

use crate::storage::ResultStore;
use crate::task::TaskOutcome;
use std::sync::Arc;
use tracing::debug;

/// Records terminal task outcomes under `"task:{id}"`
#[derive(Clone)]
pub struct ResultBackend {
    store: Arc<dyn ResultStore>,
}

impl ResultBackend {
    /// Create a backend over `store`
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }

    /// Store key for a task id
    pub fn key_for(task_id: &str) -> String {
        format!("task:{task_id}")
    }

    /// Record `outcome` for `task_id`, overwriting any earlier value
    pub async fn store_outcome(&self, task_id: &str, outcome: &TaskOutcome) -> crate::Result<()> {
        self.store
            .set(&Self::key_for(task_id), &outcome.to_string())
            .await?;
        debug!(task_id, %outcome, "Outcome recorded");
        Ok(())
    }

    /// Raw stored result for `task_id`, `None` if nothing was recorded
    pub async fn get_result(&self, task_id: &str) -> crate::Result<Option<String>> {
        self.store.get(&Self::key_for(task_id)).await
    }

    /// Stored result for `task_id` parsed into an outcome
    pub async fn get_outcome(&self, task_id: &str) -> crate::Result<Option<TaskOutcome>> {
        Ok(self
            .get_result(task_id)
            .await?
            .and_then(|value| TaskOutcome::parse(&value)))
    }
}

impl std::fmt::Debug for ResultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultBackend").finish_non_exhaustive()
    }
}
