//! Cache Store Adapter
//!
//! Turns "this entity changed" into the full set of key patterns that could
//! reference it, then evicts every match from the remote store and the local
//! cache. All operations are idempotent; a second call simply deletes zero
//! keys. Failures are logged and returned to the caller without any internal
//! retry.

use crate::keys::{regions, KeyPatternSet};
use crate::local::LocalCache;
use crate::store::CacheStore;
use crate::InvalidationResult;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Eviction primitives, one per invalidation domain.
///
/// Each call returns the number of remote keys deleted.
#[async_trait]
pub trait CacheEvictor: Send + Sync {
    async fn evict_conversation_details(&self, conversation_id: Uuid) -> InvalidationResult<usize>;

    async fn evict_conversation_messages(&self, conversation_id: Uuid)
        -> InvalidationResult<usize>;

    async fn evict_user_conversations(&self, user_id: Uuid) -> InvalidationResult<usize>;

    async fn evict_message(&self, message_id: Uuid) -> InvalidationResult<usize>;

    async fn evict_conversation_between_users(
        &self,
        user1: Uuid,
        user2: Uuid,
    ) -> InvalidationResult<usize>;

    async fn evict_first_pages(&self) -> InvalidationResult<usize>;

    async fn evict_all(&self) -> InvalidationResult<usize>;
}

/// Remote + local implementation of [`CacheEvictor`]
pub struct CacheStoreAdapter {
    remote: Arc<dyn CacheStore>,
    local: Arc<dyn LocalCache>,
    first_pages: usize,
}

impl CacheStoreAdapter {
    /// `first_pages` is K, the number of listing pages covered by page-indexed patterns
    pub fn new(
        remote: Arc<dyn CacheStore>,
        local: Arc<dyn LocalCache>,
        first_pages: usize,
    ) -> Self {
        Self {
            remote,
            local,
            first_pages,
        }
    }

    async fn evict_patterns(
        &self,
        operation: &'static str,
        sets: &[KeyPatternSet],
    ) -> InvalidationResult<usize> {
        let mut local_removed = 0;
        for pattern in sets.iter().flat_map(|set| set.patterns()) {
            local_removed += self.local.remove_matching(pattern);
        }

        let mut keys = HashSet::new();
        for pattern in sets.iter().flat_map(|set| set.patterns()) {
            match self.remote.scan_keys(pattern).await {
                Ok(found) => keys.extend(found),
                Err(e) => {
                    error!(operation, pattern = %pattern, error = %e, "Cache key scan failed");
                    return Err(e);
                }
            }
        }

        if keys.is_empty() {
            debug!(operation, local_removed, "No remote keys matched");
            return Ok(0);
        }

        let keys: Vec<String> = keys.into_iter().collect();
        match self.remote.delete_keys(&keys).await {
            Ok(deleted) => {
                debug!(operation, deleted, local_removed, "Cache keys evicted");
                Ok(deleted)
            }
            Err(e) => {
                error!(operation, keys = keys.len(), error = %e, "Cache bulk delete failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl CacheEvictor for CacheStoreAdapter {
    async fn evict_conversation_details(&self, conversation_id: Uuid) -> InvalidationResult<usize> {
        self.evict_patterns(
            "conversation_details",
            &[KeyPatternSet::for_entity(
                regions::CONVERSATION_DETAILS,
                conversation_id,
            )],
        )
        .await
    }

    async fn evict_conversation_messages(
        &self,
        conversation_id: Uuid,
    ) -> InvalidationResult<usize> {
        self.evict_patterns(
            "conversation_messages",
            &[KeyPatternSet::for_paginated_entity(
                regions::CONVERSATION_MESSAGES,
                conversation_id,
                self.first_pages,
            )],
        )
        .await
    }

    /// Covers the user's listings and every pairwise lookup naming the user
    async fn evict_user_conversations(&self, user_id: Uuid) -> InvalidationResult<usize> {
        self.evict_patterns(
            "user_conversations",
            &[
                KeyPatternSet::for_paginated_entity(
                    regions::USER_CONVERSATIONS,
                    user_id,
                    self.first_pages,
                ),
                KeyPatternSet::pairs_involving(user_id),
            ],
        )
        .await
    }

    async fn evict_message(&self, message_id: Uuid) -> InvalidationResult<usize> {
        self.evict_patterns(
            "message",
            &[KeyPatternSet::for_entity(regions::MESSAGE, message_id)],
        )
        .await
    }

    async fn evict_conversation_between_users(
        &self,
        user1: Uuid,
        user2: Uuid,
    ) -> InvalidationResult<usize> {
        let mut deleted = self.evict_user_conversations(user1).await?;
        deleted += self.evict_user_conversations(user2).await?;
        deleted += self
            .evict_patterns(
                "conversation_between_users",
                &[KeyPatternSet::pairwise(user1, user2)],
            )
            .await?;
        Ok(deleted)
    }

    async fn evict_first_pages(&self) -> InvalidationResult<usize> {
        self.evict_patterns(
            "first_pages",
            &[KeyPatternSet::first_pages(
                regions::USER_CONVERSATIONS,
                self.first_pages,
            )],
        )
        .await
    }

    async fn evict_all(&self) -> InvalidationResult<usize> {
        let sets: Vec<KeyPatternSet> = regions::ALL
            .iter()
            .map(|region| KeyPatternSet::whole_region(*region))
            .collect();
        let deleted = self.evict_patterns("all", &sets).await?;
        let local_cleared = self.local.clear();

        info!(deleted, local_cleared, "Evicted every managed cache region");
        Ok(deleted)
    }
}
