//! Integration tests against a live Redis
//!
//! Run with: REDIS_URL=redis://127.0.0.1:6379 cargo test --test redis_integration_test -- --ignored

use cache_invalidation::keys::{regions, CacheKey};
use cache_invalidation::{
    CacheEvictor, CacheStore, CacheStoreAdapter, DashMapLocalCache, RedisCacheStore,
};
use redis::AsyncCommands;
use std::sync::Arc;
use uuid::Uuid;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

async fn seed(keys: &[String]) {
    let client = redis::Client::open(redis_url()).expect("valid redis url");
    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .expect("Failed to connect to Redis");
    for key in keys {
        let _: () = conn.set(key, "{}").await.expect("Failed to seed key");
    }
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_scan_and_delete_roundtrip() {
    let store = RedisCacheStore::connect(&redis_url(), 10)
        .await
        .expect("Failed to create store");

    let message_id = Uuid::new_v4();
    let keys = vec![
        CacheKey::entry(regions::MESSAGE, message_id),
        CacheKey::entry(regions::MESSAGE, format!("{}_preview", message_id)),
    ];
    seed(&keys).await;

    let mut found = store
        .scan_keys(&format!("{}::{}*", regions::MESSAGE, message_id))
        .await
        .expect("scan failed");
    found.sort();
    let mut expected = keys.clone();
    expected.sort();
    assert_eq!(found, expected);

    assert_eq!(store.delete_keys(&found).await.expect("delete failed"), 2);
    assert_eq!(store.delete_keys(&found).await.expect("delete failed"), 0);
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_adapter_evicts_user_listing_pages() {
    let store = RedisCacheStore::connect(&redis_url(), 100)
        .await
        .expect("Failed to create store");
    let adapter = CacheStoreAdapter::new(Arc::new(store), Arc::new(DashMapLocalCache::new()), 5);

    let user_id = Uuid::new_v4();
    let keys: Vec<String> = (0..3)
        .map(|page| CacheKey::page(regions::USER_CONVERSATIONS, user_id, page, 20))
        .collect();
    seed(&keys).await;

    assert_eq!(adapter.evict_user_conversations(user_id).await.unwrap(), 3);
    assert_eq!(adapter.evict_user_conversations(user_id).await.unwrap(), 0);
}
