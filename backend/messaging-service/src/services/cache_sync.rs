//! Wiring of the cache invalidation pipeline for messaging-service
//!
//! Owns every long-lived piece: remote and local caches, adapter, fallback
//! ledger, dispatch pool, reconciliation scheduler and the publisher handed
//! to the message and conversation services.

use crate::config::Config;
use crate::error::AppResult;
use cache_invalidation::{
    CacheEventPublisher, CacheStore, CacheStoreAdapter, DashMapLocalCache, DispatchWorkers,
    FallbackLedger, InMemoryCacheStore, InvalidationConfig, InvalidationDispatcher,
    InvalidationHandler, LedgerMetrics, ReconciliationScheduler, RedisCacheStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound on waiting for queued invalidations during shutdown
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct CacheSync {
    publisher: CacheEventPublisher,
    adapter: Arc<CacheStoreAdapter>,
    local: Arc<DashMapLocalCache>,
    ledger: Arc<FallbackLedger>,
    workers: DispatchWorkers,
    scheduler: ReconciliationScheduler,
}

impl CacheSync {
    /// Connect to the configured remote cache and start the pipeline.
    ///
    /// Without `REDIS_URL` the remote tier is an in-process store, so only
    /// this instance's caches are kept coherent.
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let remote: Arc<dyn CacheStore> = match &config.redis_url {
            Some(url) => {
                let store = RedisCacheStore::connect(url, config.cache.scan_count).await?;
                info!("Cache invalidation connected to Redis");
                Arc::new(store)
            }
            None => {
                warn!("REDIS_URL not set, cache invalidation limited to the in-process store");
                Arc::new(InMemoryCacheStore::new())
            }
        };

        Ok(Self::assemble(
            &config.cache,
            remote,
            Some(LedgerMetrics::new(&config.service_name)),
        ))
    }

    /// Build and start the pipeline over an already constructed remote store.
    /// Must run inside a tokio runtime.
    pub fn assemble(
        config: &InvalidationConfig,
        remote: Arc<dyn CacheStore>,
        metrics: Option<LedgerMetrics>,
    ) -> Self {
        let local = Arc::new(DashMapLocalCache::new());
        let adapter = Arc::new(CacheStoreAdapter::new(
            remote,
            local.clone(),
            config.first_pages,
        ));

        let ledger = Arc::new(match metrics {
            Some(metrics) => {
                FallbackLedger::with_metrics(adapter.clone(), config.retry_policy(), metrics)
            }
            None => FallbackLedger::new(adapter.clone(), config.retry_policy()),
        });

        let (dispatcher, workers) = InvalidationDispatcher::start(
            InvalidationHandler::new(adapter.clone()),
            Arc::clone(&ledger),
            config.dispatch_workers,
            config.dispatch_queue_capacity,
        );
        let scheduler =
            ReconciliationScheduler::start(Arc::clone(&ledger), config.reconcile_interval());

        Self {
            publisher: CacheEventPublisher::new(dispatcher),
            adapter,
            local,
            ledger,
            workers,
            scheduler,
        }
    }

    pub fn publisher(&self) -> &CacheEventPublisher {
        &self.publisher
    }

    pub fn adapter(&self) -> &Arc<CacheStoreAdapter> {
        &self.adapter
    }

    pub fn local_cache(&self) -> &Arc<DashMapLocalCache> {
        &self.local
    }

    pub fn ledger(&self) -> &Arc<FallbackLedger> {
        &self.ledger
    }

    /// Stop the scheduler, drain queued invalidations and run one last
    /// reconciliation of every domain.
    ///
    /// Returns the number of invalidations still pending afterwards.
    pub async fn shutdown(self) -> usize {
        let Self {
            publisher,
            ledger,
            workers,
            scheduler,
            ..
        } = self;

        scheduler.shutdown().await;

        // workers exit once the last dispatcher handle is gone
        drop(publisher);
        match tokio::time::timeout(WORKER_DRAIN_TIMEOUT, workers.join()).await {
            Ok(0) => {}
            Ok(panicked) => warn!(panicked, "Dispatch workers panicked while draining"),
            Err(_) => warn!("Dispatch workers did not drain in time, detaching them"),
        }

        let cleared = ledger.reconcile_all().await;
        let remaining = ledger.pending_count();
        if remaining > 0 {
            warn!(cleared, remaining, "Shutting down with pending cache invalidations");
        } else {
            info!(cleared, "Final cache reconciliation complete");
        }
        remaining
    }
}
