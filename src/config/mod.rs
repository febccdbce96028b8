//! Configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for the task queue system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of concurrent workers
    pub worker_count: usize,

    /// Queue name; partitions are `"{queue_name}:{priority}"`
    pub queue_name: String,

    /// Store backend type
    pub store_backend: StoreBackend,

    /// Redis connection URL, used by the redis backend
    pub redis_url: String,

    /// Idle wait between polls of an empty queue, in milliseconds
    pub poll_interval_ms: u64,

    /// Default handler deadline in seconds, when a task sets none
    pub task_timeout_secs: u64,

    /// Backoff time unit in milliseconds; retry n waits `unit * 2^n`
    pub backoff_unit_ms: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
}

/// Store backends supported by the task queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store (single process only, non-persistent)
    Memory,
    /// Redis server shared by every producer and worker
    Redis,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: num_cpus(),
            queue_name: "tasks".to_string(),
            store_backend: StoreBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            poll_interval_ms: 100,
            task_timeout_secs: 300,
            backoff_unit_ms: 1000,
            shutdown_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Create a new configuration with custom values
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Default::default()
        }
    }

    /// Load configuration from file, environment variables, or defaults
    pub fn load() -> crate::Result<Self> {
        if let Ok(config_path) = env::var("TASKQ_CONFIG") {
            info!("Loading config from TASKQ_CONFIG: {}", config_path);
            return Self::from_file(&config_path);
        }

        let default_paths = [
            "config.yaml",
            "config.toml",
            "config/config.yaml",
            "config/config.toml",
        ];

        for path in default_paths {
            if Path::new(path).exists() {
                info!("Loading config from: {}", path);
                return Self::from_file(path);
            }
        }

        if let Some(config) = Self::from_env()? {
            info!("Loaded config from environment variables");
            return Ok(config);
        }

        warn!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a file (YAML or TOML)
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .map_err(|e| {
                crate::TaskQueueError::Config(format!("Failed to load config file: {}", e))
            })?;

        let config: Config = settings.try_deserialize().map_err(|e| {
            crate::TaskQueueError::Config(format!("Failed to parse config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `TASKQ_*` environment variables.
    ///
    /// Returns `Ok(None)` when none of them is set.
    pub fn from_env() -> crate::Result<Option<Self>> {
        let mut config = Self::default();
        let mut found_any = false;

        if let Some(val) = env_var("TASKQ_WORKER_COUNT") {
            config.worker_count = parse_env("WORKER_COUNT", &val)?;
            found_any = true;
        }

        if let Some(val) = env_var("TASKQ_QUEUE_NAME") {
            config.queue_name = val;
            found_any = true;
        }

        if let Some(val) = env_var("TASKQ_STORE_BACKEND") {
            config.store_backend = match val.to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "redis" => StoreBackend::Redis,
                _ => {
                    return Err(crate::TaskQueueError::Config(format!(
                        "Invalid STORE_BACKEND: {}",
                        val
                    )))
                }
            };
            found_any = true;
        }

        if let Some(val) = env_var("TASKQ_REDIS_URL") {
            config.redis_url = val;
            found_any = true;
        }

        if let Some(val) = env_var("TASKQ_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_env("POLL_INTERVAL_MS", &val)?;
            found_any = true;
        }

        if let Some(val) = env_var("TASKQ_TASK_TIMEOUT_SECS") {
            config.task_timeout_secs = parse_env("TASK_TIMEOUT_SECS", &val)?;
            found_any = true;
        }

        if let Some(val) = env_var("TASKQ_BACKOFF_UNIT_MS") {
            config.backoff_unit_ms = parse_env("BACKOFF_UNIT_MS", &val)?;
            found_any = true;
        }

        if let Some(val) = env_var("TASKQ_SHUTDOWN_TIMEOUT_SECS") {
            config.shutdown_timeout_secs = parse_env("SHUTDOWN_TIMEOUT_SECS", &val)?;
            found_any = true;
        }

        if !found_any {
            return Ok(None);
        }

        config.validate()?;
        Ok(Some(config))
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.worker_count == 0 {
            return Err(crate::TaskQueueError::Config(
                "Worker count must be greater than 0".to_string(),
            ));
        }

        if self.queue_name.trim().is_empty() {
            return Err(crate::TaskQueueError::Config(
                "Queue name must not be empty".to_string(),
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(crate::TaskQueueError::Config(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.task_timeout_secs == 0 {
            return Err(crate::TaskQueueError::Config(
                "Task timeout must be greater than 0".to_string(),
            ));
        }

        if self.backoff_unit_ms == 0 {
            return Err(crate::TaskQueueError::Config(
                "Backoff unit must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Idle wait between polls
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Default handler deadline
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    /// Backoff time unit
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    /// Graceful shutdown deadline
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parse_env<T>(name: &str, val: &str) -> crate::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    val.parse()
        .map_err(|e| crate::TaskQueueError::Config(format!("Invalid {}: {}", name, e)))
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
