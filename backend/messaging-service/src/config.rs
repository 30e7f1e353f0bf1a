use crate::error::{AppError, AppResult};
use cache_invalidation::InvalidationConfig;
use dotenvy::dotenv;
use std::env;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    /// Remote cache. `None` runs against the in-process store only.
    pub redis_url: Option<String>,
    pub log_format: LogFormat,
    pub cache: InvalidationConfig,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        dotenv().ok();

        let service_name =
            env::var("SERVICE_NAME").unwrap_or_else(|_| "messaging-service".into());
        let redis_url = env::var("REDIS_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        let cache = InvalidationConfig::from_env()
            .map_err(|e| AppError::Config(e.to_string()))?;

        Ok(Self {
            service_name,
            redis_url,
            log_format,
            cache,
        })
    }
}
