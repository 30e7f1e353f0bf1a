//! Background worker pool for invalidation dispatch
//!
//! Events enter a bounded queue and are applied by a fixed number of tokio
//! workers. Submitting never blocks: when the queue is full or already shut
//! down the event goes straight to the fallback ledger.

use crate::event::CacheInvalidationEvent;
use crate::handler::InvalidationHandler;
use crate::ledger::FallbackLedger;
use crate::InvalidationError;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Cloneable submission handle
#[derive(Clone)]
pub struct InvalidationDispatcher {
    tx: mpsc::Sender<CacheInvalidationEvent>,
    ledger: Arc<FallbackLedger>,
}

/// Join handles of the spawned workers
pub struct DispatchWorkers {
    handles: Vec<JoinHandle<()>>,
}

impl InvalidationDispatcher {
    /// Spawn `workers` tasks draining a queue of `capacity` events.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        handler: InvalidationHandler,
        ledger: Arc<FallbackLedger>,
        workers: usize,
        capacity: usize,
    ) -> (Self, DispatchWorkers) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&rx),
                    handler.clone(),
                    Arc::clone(&ledger),
                ))
            })
            .collect::<Vec<_>>();

        info!(
            workers = handles.len(),
            capacity = capacity.max(1),
            "Cache invalidation dispatch pool started"
        );

        (Self { tx, ledger }, DispatchWorkers { handles })
    }

    /// Queue an event for a background worker without waiting
    pub fn dispatch(&self, event: CacheInvalidationEvent) {
        match self.tx.try_send(event) {
            Ok(()) => debug!("Cache invalidation queued"),
            Err(TrySendError::Full(event)) => self.reject(event, "queue full"),
            Err(TrySendError::Closed(event)) => self.reject(event, "dispatch pool shut down"),
        }
    }

    fn reject(&self, event: CacheInvalidationEvent, reason: &str) {
        let err = InvalidationError::DispatchRejected(reason.to_string());
        warn!(
            kind = %event.kind,
            conversation_id = %event.conversation_id,
            error = %err,
            "Cache invalidation not queued"
        );
        self.ledger.demote(&event);
    }

    pub fn ledger(&self) -> &Arc<FallbackLedger> {
        &self.ledger
    }
}

impl DispatchWorkers {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to drain the queue and exit, returning how many
    /// of them panicked.
    ///
    /// Workers stop once every dispatcher handle has been dropped. Aborted
    /// workers are not counted.
    pub async fn join(self) -> usize {
        let mut panicked = 0;
        for handle in self.handles {
            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => debug!("Dispatch worker aborted"),
                Err(e) => {
                    panicked += 1;
                    error!(error = %e, "Dispatch worker terminated abnormally");
                }
            }
        }
        panicked
    }

    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<CacheInvalidationEvent>>>,
    handler: InvalidationHandler,
    ledger: Arc<FallbackLedger>,
) {
    loop {
        let next = { rx.lock().await.recv().await };
        let Some(event) = next else {
            break;
        };

        if let Err(e) = handler.handle(&event).await {
            error!(
                worker_id,
                kind = %event.kind,
                conversation_id = %event.conversation_id,
                error = %e,
                "Cache invalidation failed"
            );
            ledger.demote(&event);
        }
    }

    debug!(worker_id, "Dispatch worker exiting");
}
