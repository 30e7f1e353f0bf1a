//! Periodic reconciliation of the fallback ledger
//!
//! One task per domain, each sleeping `interval` between the end of one pass
//! and the start of the next. Passes never overlap within a domain.

use crate::event::InvalidationDomain;
use crate::ledger::FallbackLedger;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

pub struct ReconciliationScheduler {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl ReconciliationScheduler {
    /// Spawn the three reconciliation loops. Must run inside a tokio runtime.
    pub fn start(ledger: Arc<FallbackLedger>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = [
            InvalidationDomain::Conversation,
            InvalidationDomain::Message,
            InvalidationDomain::User,
        ]
        .into_iter()
        .map(|domain| {
            tokio::spawn(reconcile_loop(
                domain,
                Arc::clone(&ledger),
                interval,
                shutdown_rx.clone(),
            ))
        })
        .collect();

        info!(
            interval_secs = interval.as_secs_f64(),
            "Cache reconciliation scheduler started"
        );

        Self {
            shutdown_tx,
            handles,
        }
    }

    /// Signal every loop to stop and wait for in-flight passes to finish
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in std::mem::take(&mut self.handles) {
            if let Err(e) = handle.await {
                error!(error = %e, "Reconciliation task terminated abnormally");
            }
        }
        info!("Cache reconciliation scheduler stopped");
    }
}

impl Drop for ReconciliationScheduler {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in &self.handles {
            handle.abort();
        }
    }
}

async fn reconcile_loop(
    domain: InvalidationDomain,
    ledger: Arc<FallbackLedger>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!(domain = %domain, "Reconciliation loop shutting down");
                break;
            }
            _ = sleep(interval) => {
                if ledger.pending_in(domain) > 0 {
                    ledger.reconcile(domain).await;
                }
            }
        }
    }
}
