use cache_invalidation::InvalidationError;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("cache invalidation error: {0}")]
    Cache(#[from] InvalidationError),
}
