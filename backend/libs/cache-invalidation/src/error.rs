//! Error types for cache invalidation operations

use thiserror::Error;

/// Result alias used across the invalidation pipeline
pub type InvalidationResult<T> = std::result::Result<T, InvalidationError>;

/// Cache invalidation errors
#[derive(Error, Debug)]
pub enum InvalidationError {
    /// Redis connection or operation error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Non-Redis store failure (in-process stand-in, injected faults)
    #[error("Cache store error: {0}")]
    Store(String),

    /// Every attempt of a retried eviction failed
    #[error("{operation} eviction for {entity} failed after {attempts} attempts")]
    RetriesExhausted {
        operation: &'static str,
        entity: String,
        attempts: u32,
    },

    /// The dispatch queue refused the event (full or shut down)
    #[error("Dispatch rejected: {0}")]
    DispatchRejected(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}
