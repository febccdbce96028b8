//! Redis store
//!
//! Partitions are Redis sorted sets (`ZADD`, `ZRANGEBYSCORE`, `ZREM`) and
//! results are plain string keys (`SET`, `GET`). `ZREM` is atomic on the
//! server, which is what makes claiming safe across processes.

use crate::storage::{ResultStore, StoreAdapter};
use crate::TaskQueueError;
use async_trait::async_trait;
use ::redis::aio::ConnectionManager;
use tracing::debug;

/// Redis-backed store using a `ConnectionManager`.
///
/// The manager multiplexes one connection and reconnects on failure; each
/// call works on a cheap clone of it.
#[derive(Clone)]
pub struct RedisStore {
    connection_manager: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RedisStore {
    /// Connect to Redis at `url` (`redis://[:<password>@]<host>:<port>[/<db>]`)
    pub async fn connect(url: &str) -> crate::Result<Self> {
        let client = ::redis::Client::open(url).map_err(|e| {
            TaskQueueError::Store(format!("Failed to create Redis client: {}", e))
        })?;

        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| TaskQueueError::Store(format!("Failed to connect to Redis: {}", e)))?;

        debug!(url = %redact_url(url), "Redis store connected");
        Ok(Self { connection_manager })
    }

    /// Round-trip a `PING`
    pub async fn health_check(&self) -> crate::Result<bool> {
        let mut conn = self.connection_manager.clone();
        let pong: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

/// Score bound in the form `ZRANGEBYSCORE` accepts
fn score_arg(score: f64) -> String {
    if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if score == f64::INFINITY {
        "+inf".to_string()
    } else {
        format!("{score}")
    }
}

/// Strip credentials from a Redis URL before logging it
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

#[async_trait]
impl StoreAdapter for RedisStore {
    async fn zadd(&self, key: &str, score: f64, member: &[u8]) -> crate::Result<()> {
        let mut conn = self.connection_manager.clone();
        ::redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| TaskQueueError::Store(format!("Redis ZADD failed: {}", e)))?;
        Ok(())
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
        limit: usize,
    ) -> crate::Result<Vec<Vec<u8>>> {
        let mut conn = self.connection_manager.clone();
        ::redis::cmd("ZRANGEBYSCORE")
            .arg(key)
            .arg(score_arg(min))
            .arg(score_arg(max))
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async(&mut conn)
            .await
            .map_err(|e| TaskQueueError::Store(format!("Redis ZRANGEBYSCORE failed: {}", e)))
    }

    async fn zrem(&self, key: &str, member: &[u8]) -> crate::Result<u64> {
        let mut conn = self.connection_manager.clone();
        ::redis::cmd("ZREM")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await
            .map_err(|e| TaskQueueError::Store(format!("Redis ZREM failed: {}", e)))
    }

    async fn zcard(&self, key: &str) -> crate::Result<u64> {
        let mut conn = self.connection_manager.clone();
        ::redis::cmd("ZCARD")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| TaskQueueError::Store(format!("Redis ZCARD failed: {}", e)))
    }
}

#[async_trait]
impl ResultStore for RedisStore {
    async fn set(&self, key: &str, value: &str) -> crate::Result<()> {
        let mut conn = self.connection_manager.clone();
        ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| TaskQueueError::Store(format!("Redis SET failed: {}", e)))
    }

    async fn get(&self, key: &str) -> crate::Result<Option<String>> {
        let mut conn = self.connection_manager.clone();
        ::redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| TaskQueueError::Store(format!("Redis GET failed: {}", e)))
    }
}
