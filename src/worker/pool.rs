use crate::config::Config;
use crate::queue::Scheduler;
use crate::task::executor::{HandlerExecutor, RetryPolicy};
use crate::task::handler::{HandlerRegistry, TaskHandler};
use crate::worker::results::ResultBackend;
use crate::worker::Worker;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A pool of workers that process tasks concurrently
pub struct WorkerPool {
    worker_count: usize,
    scheduler: Scheduler,
    results: ResultBackend,
    registry: HandlerRegistry,
    executor: HandlerExecutor,
    retry: RetryPolicy,
    poll_interval: Duration,
    handles: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Create a pool sized and tuned by `config`
    pub fn new(scheduler: Scheduler, results: ResultBackend, config: &Config) -> Self {
        Self {
            worker_count: config.worker_count,
            scheduler,
            results,
            registry: HandlerRegistry::new(),
            executor: HandlerExecutor::new(config.task_timeout()),
            retry: RetryPolicy::new(config.backoff_unit()),
            poll_interval: config.poll_interval(),
            handles: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Install or replace the handler for `name`.
    ///
    /// Workers see the registry as it was when [`WorkerPool::start`] ran.
    pub fn register<H: TaskHandler + 'static>(&mut self, name: impl Into<String>, handler: H) {
        let name = name.into();
        if self.is_running() {
            warn!(name = %name, "Handler registered after start; running workers will not see it");
        }
        self.registry.register(name, handler);
    }

    /// Registered handlers
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Token that stops every worker of the current run when cancelled.
    ///
    /// Each completed stop (a returned [`WorkerPool::run`] or a successful
    /// [`WorkerPool::shutdown`]) installs a fresh token, so a token fetched
    /// before a restart does not reach the new workers. Fetch it again after
    /// restarting.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the workers and return immediately
    pub fn start(&mut self) -> crate::Result<()> {
        if self.is_running() {
            return Err(crate::TaskQueueError::WorkerPool(
                "Worker pool is already running".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(crate::TaskQueueError::WorkerPool(
                "Worker count must be greater than 0".to_string(),
            ));
        }

        info!(
            workers = self.worker_count,
            handlers = self.registry.len(),
            queue = %self.scheduler.queue_name(),
            "Starting worker pool"
        );

        let template = Worker::new(
            0,
            self.scheduler.clone(),
            self.results.clone(),
            Arc::new(self.registry.clone()),
        )
        .with_executor(self.executor.clone())
        .with_retry_policy(self.retry)
        .with_poll_interval(self.poll_interval);

        for i in 0..self.worker_count {
            let worker = template.clone().with_id(i);
            let cancel = self.cancel.clone();

            let handle = tokio::spawn(async move {
                worker.run(cancel).await;
            });

            self.handles.push(handle);
        }

        Ok(())
    }

    /// Wait until every worker has stopped.
    ///
    /// A handle is dropped only once its worker has finished, so a `join`
    /// cut short by a timeout leaves the remaining workers tracked.
    pub async fn join(&mut self) {
        while let Some(handle) = self.handles.first_mut() {
            let result = handle.await;
            self.handles.remove(0);
            match result {
                Ok(()) => info!(remaining = self.handles.len(), "Worker stopped gracefully"),
                Err(e) => warn!("Worker panicked: {}", e),
            }
        }
    }

    /// Start the workers and block until they all stop.
    ///
    /// Workers only stop once the [`WorkerPool::cancellation_token`] fires.
    pub async fn run(&mut self) -> crate::Result<()> {
        self.start()?;
        self.join().await;
        self.cancel = CancellationToken::new();
        Ok(())
    }

    /// Initiate graceful shutdown of the worker pool
    pub async fn shutdown(&mut self, timeout_duration: Duration) -> crate::Result<()> {
        info!("Initiating graceful shutdown...");

        self.cancel.cancel();

        info!(
            "Waiting for {} workers to complete (timeout: {:?})...",
            self.handles.len(),
            timeout_duration
        );

        match timeout(timeout_duration, self.join()).await {
            Ok(()) => {
                // A fresh token lets the pool be started again
                self.cancel = CancellationToken::new();
                info!("All workers stopped successfully");
                Ok(())
            }
            Err(_) => {
                // Stragglers stay tracked under the cancelled token; another
                // shutdown call resumes waiting for them
                warn!(
                    remaining = self.handles.len(),
                    "Shutdown timeout exceeded, some workers are still running"
                );
                Err(crate::TaskQueueError::WorkerPool(
                    "Shutdown timeout exceeded".to_string(),
                ))
            }
        }
    }

    /// Get the number of workers in the pool
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Check if the pool is running
    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }
}
