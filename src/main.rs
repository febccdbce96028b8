//! taskq binary entry point

use serde::Deserialize;
use std::sync::Arc;
use taskq::config::{Config, StoreBackend};
use taskq::storage::{ResultStore, StoreAdapter};
use taskq::task::handler::HandlerResult;
use taskq::{MemoryStore, Payload, Priority, ResultBackend, Scheduler, WorkerPool};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Deserialize)]
struct Email {
    email: String,
}

async fn send_email(payload: Payload) -> HandlerResult {
    let data: Email = payload.decode().map_err(|e| e.to_string())?;
    info!(to = %data.email, "Sending email");
    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
    Ok(())
}

async fn build_store(
    config: &Config,
) -> taskq::Result<(Arc<dyn StoreAdapter>, Arc<dyn ResultStore>)> {
    match config.store_backend {
        StoreBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            let adapter: Arc<dyn StoreAdapter> = store.clone();
            let results: Arc<dyn ResultStore> = store;
            Ok((adapter, results))
        }
        #[cfg(feature = "redis")]
        StoreBackend::Redis => {
            let store =
                Arc::new(taskq::storage::redis::RedisStore::connect(&config.redis_url).await?);
            if !store.health_check().await? {
                return Err(taskq::TaskQueueError::Store(
                    "Redis did not answer PING".to_string(),
                ));
            }
            let adapter: Arc<dyn StoreAdapter> = store.clone();
            let results: Arc<dyn ResultStore> = store;
            Ok((adapter, results))
        }
        #[cfg(not(feature = "redis"))]
        StoreBackend::Redis => Err(taskq::TaskQueueError::Config(
            "Redis backend requires the `redis` feature".to_string(),
        )),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting taskq");

    let config = Config::load()?;
    config.validate()?;

    info!(
        "Initialized with {} workers, queue: {}, backend: {:?}",
        config.worker_count, config.queue_name, config.store_backend
    );

    let (store, result_store) = build_store(&config).await?;
    let scheduler = Scheduler::new(store, config.queue_name.clone());
    let results = ResultBackend::new(result_store);

    if std::env::var("TASKQ_DEMO").is_ok_and(|v| v == "1") {
        let task_id = scheduler
            .enqueue(
                "send_email",
                &serde_json::json!({"email": "user@example.com"}),
                Priority::High,
                3,
            )
            .await?;
        info!(task_id = %task_id, "Demo task enqueued");
    }

    let mut worker_pool = WorkerPool::new(scheduler, results, &config);
    worker_pool.register("send_email", send_email);
    worker_pool.start()?;

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");

    if let Err(e) = worker_pool.shutdown(config.shutdown_timeout()).await {
        error!("Shutdown incomplete: {}", e);
    }

    Ok(())
}
