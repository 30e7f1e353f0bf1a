use prometheus::{IntCounter, IntGauge, Opts};
use tracing::warn;

/// Prometheus view of the fallback ledger
#[derive(Clone)]
pub struct LedgerMetrics {
    pub pending: IntGauge,
    pub oldest_pending_age_seconds: IntGauge,
    pub reconciled: IntCounter,
    pub demoted: IntCounter,
}

impl LedgerMetrics {
    /// Build metrics and register them with the default registry
    pub fn new(service: &str) -> Self {
        let metrics = Self::unregistered(service);
        let registry = prometheus::default_registry();

        for metric in [
            Box::new(metrics.pending.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(metrics.oldest_pending_age_seconds.clone()),
            Box::new(metrics.reconciled.clone()),
            Box::new(metrics.demoted.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("Failed to register cache invalidation metric: {}", e);
            }
        }

        metrics
    }

    /// Build metrics without touching any registry
    pub fn unregistered(service: &str) -> Self {
        let opts = |name: &str, help: &str| {
            Opts::new(name, help).const_label("service", service.to_string())
        };

        Self {
            pending: IntGauge::with_opts(opts(
                "cache_invalidation_pending",
                "Number of invalidations waiting in the fallback ledger",
            ))
            .expect("valid metric opts for cache_invalidation_pending"),
            oldest_pending_age_seconds: IntGauge::with_opts(opts(
                "cache_invalidation_oldest_pending_age_seconds",
                "Age in seconds of the oldest pending invalidation",
            ))
            .expect("valid metric opts for cache_invalidation_oldest_pending_age_seconds"),
            reconciled: IntCounter::with_opts(opts(
                "cache_invalidation_reconciled_total",
                "Total ledger entries cleared by reconciliation passes",
            ))
            .expect("valid metric opts for cache_invalidation_reconciled_total"),
            demoted: IntCounter::with_opts(opts(
                "cache_invalidation_demoted_total",
                "Total dispatches handed to the fallback ledger after failing",
            ))
            .expect("valid metric opts for cache_invalidation_demoted_total"),
        }
    }
}
