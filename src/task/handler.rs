//! Handler

use crate::task::Payload;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Result returned by a task handler; the error string is the failure reason
pub type HandlerResult = std::result::Result<(), String>;

/// Business logic for one task name
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Run the handler against a task's payload
    async fn handle(&self, payload: &Payload) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> TaskHandler for F
where
    F: Fn(Payload) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn handle(&self, payload: &Payload) -> HandlerResult {
        (self)(payload.clone()).await
    }
}

/// Mapping from task name to handler.
///
/// Filled before the pool starts and shared read-only by every worker.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace the handler for `name`
    pub fn register<H: TaskHandler + 'static>(&mut self, name: impl Into<String>, handler: H) {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    /// Look up the handler for `name`
    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Check if a handler is registered for `name`
    pub fn has_handler(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered task names
    pub fn names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("names", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
