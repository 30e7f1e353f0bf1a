//! Commit-aware cache invalidation for conversations and messages
//!
//! Keeps the Redis cache and the in-process cache coherent with the
//! relational source of truth without ever failing the business write that
//! triggered the invalidation.
//!
//! # Architecture
//!
//! ```text
//! message/conversation service (inside its DB transaction):
//!   1. publisher.publish_message_created(Some(&scope), ...)
//!      -> deferred on the TransactionScope
//!   2. tx.commit() ok -> scope.commit()
//!      -> InvalidationDispatcher (bounded queue, N tokio workers)
//!      -> InvalidationHandler -> CacheStoreAdapter
//!           SCAN MATCH region::*id* ... ; DEL k1 k2 ...   (Redis)
//!           remove_matching(pattern)                     (DashMap)
//!   3. any failure -> FallbackLedger.demote(event)
//!
//! ReconciliationScheduler (every 30s, one task per domain):
//!   ledger.reconcile(domain) -> retry 3x, 100ms * attempt backoff
//!   -> remove entry only on success
//! ```
//!
//! # Example
//!
//! ```no_run
//! use cache_invalidation::{
//!     CacheEventPublisher, CacheStoreAdapter, DashMapLocalCache, FallbackLedger,
//!     InvalidationConfig, InvalidationDispatcher, InvalidationHandler, InvalidationTarget,
//!     RedisCacheStore, TransactionScope,
//! };
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! struct Conversation(Uuid);
//!
//! impl InvalidationTarget for Conversation {
//!     fn target_ref(&self) -> String {
//!         format!("conversation:{}", self.0)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = InvalidationConfig::from_env()?;
//!     let remote = RedisCacheStore::connect("redis://localhost:6379", config.scan_count).await?;
//!     let adapter = Arc::new(CacheStoreAdapter::new(
//!         Arc::new(remote),
//!         Arc::new(DashMapLocalCache::new()),
//!         config.first_pages,
//!     ));
//!     let ledger = Arc::new(FallbackLedger::new(adapter.clone(), config.retry_policy()));
//!     let (dispatcher, _workers) = InvalidationDispatcher::start(
//!         InvalidationHandler::new(adapter),
//!         ledger,
//!         config.dispatch_workers,
//!         config.dispatch_queue_capacity,
//!     );
//!     let publisher = CacheEventPublisher::new(dispatcher);
//!
//!     let conversation_id = Uuid::new_v4();
//!     let scope = TransactionScope::begin();
//!     publisher.publish_messages_read(
//!         Some(&scope),
//!         "message-service",
//!         &Conversation(conversation_id),
//!         conversation_id,
//!         None,
//!     );
//!     // ... database commit succeeded
//!     scope.commit();
//!
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod config;
pub mod dispatch;
mod error;
pub mod event;
pub mod handler;
pub mod keys;
pub mod ledger;
pub mod local;
pub mod metrics;
pub mod publisher;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod transaction;

pub use adapter::{CacheEvictor, CacheStoreAdapter};
pub use config::InvalidationConfig;
pub use dispatch::{DispatchWorkers, InvalidationDispatcher};
pub use error::{InvalidationError, InvalidationResult};
pub use event::{
    CacheInvalidationEvent, InvalidationDomain, InvalidationEventKind, InvalidationTarget,
};
pub use handler::InvalidationHandler;
pub use keys::{regions, CacheKey, KeyPatternSet};
pub use ledger::{FallbackLedger, PendingInvalidation};
pub use local::{DashMapLocalCache, LocalCache};
pub use metrics::LedgerMetrics;
pub use publisher::CacheEventPublisher;
pub use retry::RetryPolicy;
pub use scheduler::ReconciliationScheduler;
pub use store::{CacheStore, InMemoryCacheStore, RedisCacheStore, SharedRedis};
pub use transaction::{DeferredAction, TransactionOutcome, TransactionScope};
