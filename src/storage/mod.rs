/// In-memory store implementation
pub mod backend;
/// Redis store implementation
#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;

/// Sorted-set operations the scheduler needs from a shared store.
///
/// Each partition key names one sorted set of opaque members ordered by a
/// floating point score. `zrem` must be atomic: when several callers remove
/// the same member concurrently, exactly one of them observes a count of 1.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Add `member` to the set at `key` with `score`, updating the score if
    /// the member already exists
    async fn zadd(&self, key: &str, score: f64, member: &[u8]) -> crate::Result<()>;

    /// Members with `min <= score <= max`, ascending by score, at most `limit`
    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: usize,
    ) -> crate::Result<Vec<Vec<u8>>>;

    /// Remove `member` from the set at `key`, returning the number removed
    async fn zrem(&self, key: &str, member: &[u8]) -> crate::Result<u64>;

    /// Number of members in the set at `key`
    async fn zcard(&self, key: &str) -> crate::Result<u64>;
}

/// Plain key/value operations used to persist task outcomes
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Associate `value` with `key`, overwriting any previous value
    async fn set(&self, key: &str, value: &str) -> crate::Result<()>;

    /// Last value stored under `key`, or `None` if never written
    async fn get(&self, key: &str) -> crate::Result<Option<String>>;
}
