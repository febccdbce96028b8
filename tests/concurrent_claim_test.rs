use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use taskq::queue::Scheduler;
use taskq::storage::backend::MemoryStore;
use taskq::storage::StoreAdapter;
use taskq::task::Priority;
use tokio::sync::Barrier;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_on_single_task_have_one_winner() {
    let scheduler = Scheduler::new(Arc::new(MemoryStore::new()), "tasks");
    let id = scheduler.enqueue("job", &(), Priority::High, 0).await.unwrap();

    let claimers = 16;
    let barrier = Arc::new(Barrier::new(claimers));
    let mut handles = vec![];

    for _ in 0..claimers {
        let scheduler = scheduler.clone();
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            scheduler.claim().await.unwrap()
        }));
    }

    let mut winners = vec![];
    for handle in handles {
        if let Some(task) = handle.await.unwrap() {
            winners.push(task.id);
        }
    }

    assert_eq!(winners, vec![id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_no_duplicates() {
    let scheduler = Scheduler::new(Arc::new(MemoryStore::new()), "tasks");

    let mut enqueued = HashSet::new();
    for i in 0..100 {
        let priority = Priority::ALL[i % 3];
        let id = scheduler
            .enqueue("job", &serde_json::json!({"id": i}), priority, 0)
            .await
            .unwrap();
        enqueued.insert(id);
    }

    let mut handles = vec![];
    for _ in 0..10 {
        let scheduler = scheduler.clone();
        handles.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            loop {
                match scheduler.claim().await.unwrap() {
                    Some(task) => claimed.push(task.id),
                    None => {
                        // A lost race also yields None; stop only once drained
                        let mut remaining = 0;
                        for priority in Priority::ALL {
                            remaining += scheduler.pending(priority).await.unwrap();
                        }
                        if remaining == 0 {
                            break;
                        }
                        tokio::task::yield_now().await;
                    }
                }
            }
            claimed
        }));
    }

    let mut claimed = Vec::new();
    for handle in handles {
        claimed.extend(handle.await.unwrap());
    }

    let unique: HashSet<_> = claimed.iter().cloned().collect();
    assert_eq!(
        claimed.len(),
        unique.len(),
        "Race condition detected: {} duplicate claims",
        claimed.len() - unique.len()
    );
    assert_eq!(unique, enqueued);

    for priority in Priority::ALL {
        assert_eq!(scheduler.pending(priority).await.unwrap(), 0);
    }
}

/// Store whose range query always sees the member but whose removal
/// reports it was already taken, as when another process wins the race
struct LostRaceStore {
    inner: MemoryStore,
}

#[async_trait]
impl StoreAdapter for LostRaceStore {
    async fn zadd(&self, key: &str, score: f64, member: &[u8]) -> taskq::Result<()> {
        self.inner.zadd(key, score, member).await
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: usize,
    ) -> taskq::Result<Vec<Vec<u8>>> {
        self.inner.zrange_by_score(key, min, max, limit).await
    }

    async fn zrem(&self, _key: &str, _member: &[u8]) -> taskq::Result<u64> {
        Ok(0)
    }

    async fn zcard(&self, key: &str) -> taskq::Result<u64> {
        self.inner.zcard(key).await
    }
}

#[tokio::test]
async fn test_lost_removal_returns_none_without_trying_next_tier() {
    let scheduler = Scheduler::new(
        Arc::new(LostRaceStore {
            inner: MemoryStore::new(),
        }),
        "tasks",
    );
    scheduler.enqueue("job", &(), Priority::High, 0).await.unwrap();
    scheduler.enqueue("job", &(), Priority::Low, 0).await.unwrap();

    assert!(scheduler.claim().await.unwrap().is_none());
}

/// Store that fails every call
struct DownStore;

#[async_trait]
impl StoreAdapter for DownStore {
    async fn zadd(&self, _: &str, _: f64, _: &[u8]) -> taskq::Result<()> {
        Err(taskq::TaskQueueError::Store("connection refused".to_string()))
    }

    async fn zrange_by_score(&self, _: &str, _: f64, _: f64, _: usize) -> taskq::Result<Vec<Vec<u8>>> {
        Err(taskq::TaskQueueError::Store("connection refused".to_string()))
    }

    async fn zrem(&self, _: &str, _: &[u8]) -> taskq::Result<u64> {
        Err(taskq::TaskQueueError::Store("connection refused".to_string()))
    }

    async fn zcard(&self, _: &str) -> taskq::Result<u64> {
        Err(taskq::TaskQueueError::Store("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_store_errors_surface_to_producer_and_claimer() {
    let scheduler = Scheduler::new(Arc::new(DownStore), "tasks");

    let enqueue = scheduler.enqueue("job", &(), Priority::High, 0).await;
    assert!(matches!(enqueue, Err(taskq::TaskQueueError::Store(_))));

    let claim = scheduler.claim().await;
    assert!(matches!(claim, Err(taskq::TaskQueueError::Store(_))));
}
