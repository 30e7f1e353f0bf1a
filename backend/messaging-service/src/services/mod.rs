pub mod cache_sync;

pub use cache_sync::CacheSync;
