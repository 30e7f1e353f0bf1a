//! Remote key/value store access
//!
//! The subsystem only ever lists keys by glob pattern and deletes them in
//! bulk; it never reads cached payloads.

use crate::keys::glob_match;
use crate::{InvalidationError, InvalidationResult};
use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Shared Redis connection manager
pub type SharedRedis = Arc<Mutex<ConnectionManager>>;

/// Pattern scan + bulk delete over the remote cache
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// List every key matching a glob pattern
    async fn scan_keys(&self, pattern: &str) -> InvalidationResult<Vec<String>>;

    /// Delete the given keys, returning how many existed
    async fn delete_keys(&self, keys: &[String]) -> InvalidationResult<usize>;
}

/// Redis-backed store using SCAN (never blocking KEYS)
#[derive(Clone)]
pub struct RedisCacheStore {
    redis: SharedRedis,
    scan_count: usize,
}

impl RedisCacheStore {
    pub fn new(redis: SharedRedis, scan_count: usize) -> Self {
        Self { redis, scan_count }
    }

    /// Connect directly from a URL
    pub async fn connect(redis_url: &str, scan_count: usize) -> InvalidationResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self::new(Arc::new(Mutex::new(manager)), scan_count))
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn scan_keys(&self, pattern: &str) -> InvalidationResult<Vec<String>> {
        let mut conn = self.redis.lock().await;
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(&mut *conn)
                .await?;

            found.extend(keys);

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %pattern, found = found.len(), "Redis scan complete");
        Ok(found)
    }

    async fn delete_keys(&self, keys: &[String]) -> InvalidationResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.redis.lock().await;
        let deleted: usize = conn.del(keys).await?;

        debug!(requested = keys.len(), deleted, "Redis bulk delete");
        Ok(deleted)
    }
}

/// Process-local stand-in for the remote store.
///
/// Used when no Redis URL is configured and by tests. `set_unavailable(true)`
/// makes every call fail like an unreachable server.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: DashMap<String, String>,
    unavailable: AtomicBool,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> InvalidationResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(InvalidationError::Store(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn scan_keys(&self, pattern: &str) -> InvalidationResult<Vec<String>> {
        self.check_available()?;
        Ok(self
            .entries
            .iter()
            .filter(|entry| glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn delete_keys(&self, keys: &[String]) -> InvalidationResult<usize> {
        self.check_available()?;
        let unique: HashSet<&String> = keys.iter().collect();
        Ok(unique
            .into_iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count())
    }
}
