//! Backend

use crate::storage::{ResultStore, StoreAdapter};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Sorted set entry
type Entry = (f64, Vec<u8>);

/// In-memory store backing both partitions and results.
///
/// Each call holds the lock for its whole duration, so `zrem` is atomic
/// across clones sharing the same store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    partitions: Arc<RwLock<HashMap<String, Vec<Entry>>>>,
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every partition and stored value
    pub async fn clear(&self) {
        self.partitions.write().await.clear();
        self.values.write().await.clear();
    }
}

/// Score order, members breaking ties
fn entry_cmp(a: &Entry, b: &Entry) -> Ordering {
    a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1))
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    async fn zadd(&self, key: &str, score: f64, member: &[u8]) -> crate::Result<()> {
        if score.is_nan() {
            return Err(crate::TaskQueueError::Store(
                "score is not a valid float".to_string(),
            ));
        }

        let mut partitions = self.partitions.write().await;
        let set = partitions.entry(key.to_string()).or_default();
        set.retain(|(_, m)| m.as_slice() != member);

        let entry = (score, member.to_vec());
        let index = set.partition_point(|e| entry_cmp(e, &entry) == Ordering::Less);
        set.insert(index, entry);

        debug!(key, score, "Member added");
        Ok(())
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: usize,
    ) -> crate::Result<Vec<Vec<u8>>> {
        let partitions = self.partitions.read().await;
        let Some(set) = partitions.get(key) else {
            return Ok(Vec::new());
        };

        Ok(set
            .iter()
            .skip_while(|(score, _)| *score < min)
            .take_while(|(score, _)| *score <= max)
            .take(limit)
            .map(|(_, member)| member.clone())
            .collect())
    }

    async fn zrem(&self, key: &str, member: &[u8]) -> crate::Result<u64> {
        let mut partitions = self.partitions.write().await;
        let Some(set) = partitions.get_mut(key) else {
            return Ok(0);
        };

        let before = set.len();
        set.retain(|(_, m)| m.as_slice() != member);
        let removed = (before - set.len()) as u64;

        if set.is_empty() {
            partitions.remove(key);
        }
        Ok(removed)
    }

    async fn zcard(&self, key: &str) -> crate::Result<u64> {
        let partitions = self.partitions.read().await;
        Ok(partitions.get(key).map_or(0, |set| set.len() as u64))
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        let mut values = self.values.write().await;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> crate::Result<Option<String>> {
        let values = self.values.read().await;
        Ok(values.get(key).cloned())
    }
}
