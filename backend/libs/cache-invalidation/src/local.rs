//! In-process cache layer
//!
//! Entries are keyed by the same full cache key the remote store uses, so a
//! single [`KeyPatternSet`](crate::KeyPatternSet) evicts both tiers.

use crate::keys::glob_match;
use dashmap::DashMap;
use serde_json::Value;

/// Local eviction surface used by the store adapter
pub trait LocalCache: Send + Sync {
    /// Remove every entry whose key matches the glob pattern
    fn remove_matching(&self, pattern: &str) -> usize;

    /// Drop everything
    fn clear(&self) -> usize;
}

/// DashMap-backed local cache
#[derive(Default)]
pub struct DashMapLocalCache {
    entries: DashMap<String, Value>,
}

impl DashMapLocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
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
}

impl LocalCache for DashMapLocalCache {
    fn remove_matching(&self, pattern: &str) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, _| {
            let hit = glob_match(pattern, key);
            if hit {
                removed += 1;
            }
            !hit
        });
        removed
    }

    fn clear(&self) -> usize {
        let before = self.entries.len();
        self.entries.clear();
        before
    }
}
