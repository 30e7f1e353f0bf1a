use anyhow::Context;
use messaging_service::config::Config;
use messaging_service::logging;
use messaging_service::services::CacheSync;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::from_env().context("failed to load configuration")?;
    logging::init_tracing(cfg.log_format);

    let sync = CacheSync::connect(&cfg)
        .await
        .context("failed to start cache invalidation")?;

    info!(
        service = %cfg.service_name,
        workers = cfg.cache.dispatch_workers,
        reconcile_interval_secs = cfg.cache.reconcile_interval_secs,
        "messaging-service cache sync running"
    );

    let mut ticker = tokio::time::interval(cfg.cache.reconcile_interval());
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                let ledger = sync.ledger();
                ledger.refresh_metrics();
                let pending = ledger.pending_count();
                if let Some(metrics) = ledger.metrics() {
                    info!(
                        pending = metrics.pending.get(),
                        oldest_pending_age_seconds = metrics.oldest_pending_age_seconds.get(),
                        demoted_total = metrics.demoted.get(),
                        reconciled_total = metrics.reconciled.get(),
                        "Cache invalidation ledger status"
                    );
                }
                if pending > 0 {
                    warn!(pending, "Cache invalidations awaiting reconciliation");
                }
            }
        }
    }

    let remaining = sync.shutdown().await;
    info!(remaining, "messaging-service stopped");
    Ok(())
}
