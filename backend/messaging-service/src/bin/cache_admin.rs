//! Administrative cache eviction for messaging-service
//!
//! Uses the same REDIS_URL and CACHE_* settings as the service.

use anyhow::{bail, Context};
use cache_invalidation::{
    CacheEvictor, CacheStoreAdapter, DashMapLocalCache, FallbackLedger, RedisCacheStore,
};
use messaging_service::config::Config;
use std::env;
use std::sync::Arc;
use uuid::Uuid;

fn usage() {
    eprintln!("Usage:");
    eprintln!("  cache-admin evict-conversation <conversation_uuid>");
    eprintln!("  cache-admin evict-messages <conversation_uuid>");
    eprintln!("  cache-admin evict-user <user_uuid>");
    eprintln!("  cache-admin evict-message <message_uuid>");
    eprintln!("  cache-admin evict-pair <user_uuid> <user_uuid>");
    eprintln!("  cache-admin evict-first-pages");
    eprintln!("  cache-admin evict-all");
    eprintln!("  cache-admin invalidate-now <conversation_uuid>");
}

fn parse_id(raw: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid uuid: {raw}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    let cfg = Config::from_env().context("failed to load configuration")?;
    let Some(redis_url) = cfg.redis_url.as_deref() else {
        bail!("REDIS_URL must be set for cache-admin");
    };
    let remote = RedisCacheStore::connect(redis_url, cfg.cache.scan_count)
        .await
        .context("failed to connect to Redis")?;
    let adapter = Arc::new(CacheStoreAdapter::new(
        Arc::new(remote),
        Arc::new(DashMapLocalCache::new()),
        cfg.cache.first_pages,
    ));

    let cmd = args[1].as_str();
    let deleted = match cmd {
        "evict-conversation" if args.len() == 3 => {
            adapter
                .evict_conversation_details(parse_id(&args[2])?)
                .await?
        }
        "evict-messages" if args.len() == 3 => {
            adapter
                .evict_conversation_messages(parse_id(&args[2])?)
                .await?
        }
        "evict-user" if args.len() == 3 => {
            adapter
                .evict_user_conversations(parse_id(&args[2])?)
                .await?
        }
        "evict-message" if args.len() == 3 => adapter.evict_message(parse_id(&args[2])?).await?,
        "evict-pair" if args.len() == 4 => {
            adapter
                .evict_conversation_between_users(parse_id(&args[2])?, parse_id(&args[3])?)
                .await?
        }
        "evict-first-pages" if args.len() == 2 => adapter.evict_first_pages().await?,
        "evict-all" if args.len() == 2 => adapter.evict_all().await?,
        "invalidate-now" if args.len() == 3 => {
            let conversation_id = parse_id(&args[2])?;
            let ledger = FallbackLedger::new(adapter.clone(), cfg.cache.retry_policy());
            ledger
                .execute_immediate(conversation_id)
                .await
                .with_context(|| format!("immediate invalidation of {conversation_id} failed"))?;
            println!("Invalidated conversation {}", conversation_id);
            return Ok(());
        }
        _ => {
            eprintln!("Invalid arguments");
            usage();
            std::process::exit(1);
        }
    };

    println!("{}: deleted {} keys", cmd, deleted);
    Ok(())
}
