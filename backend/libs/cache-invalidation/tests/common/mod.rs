//! Shared fixtures for cache-invalidation integration tests
#![allow(dead_code)]

use cache_invalidation::{
    CacheEvictor, InvalidationError, InvalidationResult, InvalidationTarget, RetryPolicy,
};
use mockall::mock;
use std::time::Duration;
use uuid::Uuid;

mock! {
    pub Evictor {}

    #[async_trait::async_trait]
    impl CacheEvictor for Evictor {
        async fn evict_conversation_details(&self, id: Uuid) -> InvalidationResult<usize>;
        async fn evict_conversation_messages(&self, id: Uuid) -> InvalidationResult<usize>;
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
}

/// Route library logs to the test harness output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("cache_invalidation=debug")
        .with_test_writer()
        .try_init();
}

/// Same attempt budget as production, without the wait
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        backoff_step: Duration::from_millis(1),
    }
}

pub fn store_down() -> InvalidationError {
    InvalidationError::Store("connection refused".to_string())
}

/// Message-shaped target with both participants
pub struct MessageTarget {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
}

impl MessageTarget {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
        }
    }
}

impl InvalidationTarget for MessageTarget {
    fn target_ref(&self) -> String {
        format!("message:{}", self.id)
    }

    fn sender_id(&self) -> Option<Uuid> {
        Some(self.sender_id)
    }

    fn receiver_id(&self) -> Option<Uuid> {
        Some(self.receiver_id)
    }
}

/// A target shape that carries no participant information
pub struct OpaqueTarget;

impl InvalidationTarget for OpaqueTarget {
    fn target_ref(&self) -> String {
        "opaque".to_string()
    }
}
