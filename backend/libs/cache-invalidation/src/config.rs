use crate::retry::RetryPolicy;
use crate::{InvalidationError, InvalidationResult};
use std::time::Duration;

/// Tunables for the invalidation pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationConfig {
    /// Delay between reconciliation passes of one domain
    pub reconcile_interval_secs: u64,
    pub dispatch_workers: usize,
    pub dispatch_queue_capacity: usize,
    pub retry_max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Number of listing pages covered by page-indexed patterns
    pub first_pages: usize,
    /// `COUNT` hint passed to each `SCAN`
    pub scan_count: usize,
}

impl Default for InvalidationConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: 30,
            dispatch_workers: 4,
            dispatch_queue_capacity: 1024,
            retry_max_attempts: 3,
            retry_backoff_ms: 100,
            first_pages: 5,
            scan_count: 100,
        }
    }
}

impl InvalidationConfig {
    /// Load from `CACHE_*` environment variables, falling back to defaults.
    ///
    /// Unparseable values fall back to the default as well; the result is
    /// validated before it is returned.
    pub fn from_env() -> InvalidationResult<Self> {
        let defaults = Self::default();

        let config = Self {
            reconcile_interval_secs: env_or(
                "CACHE_RECONCILE_INTERVAL_SECS",
                defaults.reconcile_interval_secs,
            ),
            dispatch_workers: env_or("CACHE_DISPATCH_WORKERS", defaults.dispatch_workers),
            dispatch_queue_capacity: env_or(
                "CACHE_DISPATCH_QUEUE_CAPACITY",
                defaults.dispatch_queue_capacity,
            ),
            retry_max_attempts: env_or("CACHE_RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts),
            retry_backoff_ms: env_or("CACHE_RETRY_BACKOFF_MS", defaults.retry_backoff_ms),
            first_pages: env_or("CACHE_FIRST_PAGES", defaults.first_pages),
            scan_count: env_or("CACHE_SCAN_COUNT", defaults.scan_count),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> InvalidationResult<()> {
        let positive = [
            ("CACHE_RECONCILE_INTERVAL_SECS", self.reconcile_interval_secs as u128),
            ("CACHE_DISPATCH_WORKERS", self.dispatch_workers as u128),
            ("CACHE_DISPATCH_QUEUE_CAPACITY", self.dispatch_queue_capacity as u128),
            ("CACHE_RETRY_MAX_ATTEMPTS", self.retry_max_attempts as u128),
            ("CACHE_FIRST_PAGES", self.first_pages as u128),
            ("CACHE_SCAN_COUNT", self.scan_count as u128),
        ];

        for (name, value) in positive {
            if value == 0 {
                return Err(InvalidationError::Configuration(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            backoff_step: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 7] = [
        "CACHE_RECONCILE_INTERVAL_SECS",
        "CACHE_DISPATCH_WORKERS",
        "CACHE_DISPATCH_QUEUE_CAPACITY",
        "CACHE_RETRY_MAX_ATTEMPTS",
        "CACHE_RETRY_BACKOFF_MS",
        "CACHE_FIRST_PAGES",
        "CACHE_SCAN_COUNT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_uses_defaults() {
        clear_env();

        let config = InvalidationConfig::from_env().unwrap();
        assert_eq!(config, InvalidationConfig::default());
        assert_eq!(config.reconcile_interval(), Duration::from_secs(30));

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_step, Duration::from_millis(100));
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("CACHE_DISPATCH_WORKERS", "8");
        std::env::set_var("CACHE_RETRY_BACKOFF_MS", "250");
        std::env::set_var("CACHE_FIRST_PAGES", "not-a-number");

        let config = InvalidationConfig::from_env().unwrap();
        assert_eq!(config.dispatch_workers, 8);
        assert_eq!(config.retry_backoff_ms, 250);
        assert_eq!(config.first_pages, 5);

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_zero_value_is_rejected() {
        clear_env();
        std::env::set_var("CACHE_RETRY_MAX_ATTEMPTS", "0");

        let err = InvalidationConfig::from_env().unwrap_err();
        assert!(matches!(err, InvalidationError::Configuration(_)));
        assert!(err.to_string().contains("CACHE_RETRY_MAX_ATTEMPTS"));

        clear_env();
    }

    #[test]
    fn test_zero_backoff_is_allowed() {
        let config = InvalidationConfig {
            retry_backoff_ms: 0,
            ..InvalidationConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
