//! Fallback ledger behaviour against a mocked evictor

mod common;

use cache_invalidation::{
    CacheInvalidationEvent, FallbackLedger, InvalidationDomain, InvalidationError,
    InvalidationEventKind, LedgerMetrics,
};
use common::{fast_retry, store_down, MessageTarget, MockEvictor};
use mockall::predicate::*;
use std::sync::Arc;
use uuid::Uuid;

fn ledger_with(evictor: MockEvictor) -> FallbackLedger {
    FallbackLedger::new(Arc::new(evictor), fast_retry())
}

#[tokio::test]
async fn test_conversation_and_user_passes_drain_ledger() {
    let c1 = Uuid::new_v4();
    let u1 = Uuid::new_v4();

    let mut evictor = MockEvictor::new();
    evictor
        .expect_evict_conversation_details()
        .with(eq(c1))
        .times(1)
        .returning(|_| Ok(1));
    evictor
        .expect_evict_conversation_messages()
        .with(eq(c1))
        .times(1)
        .returning(|_| Ok(3));
    evictor
        .expect_evict_user_conversations()
        .with(eq(u1))
        .times(1)
        .returning(|_| Ok(2));
    // once for the conversation, once for the user
    evictor.expect_evict_first_pages().times(2).returning(|| Ok(0));

    let ledger = ledger_with(evictor);
    assert!(ledger.register_pending(
        InvalidationDomain::Conversation,
        Some(c1),
        InvalidationEventKind::MessageCreated,
    ));
    assert!(ledger.register_pending(
        InvalidationDomain::User,
        Some(u1),
        InvalidationEventKind::MessagesRead,
    ));
    assert_eq!(ledger.pending_count(), 2);

    assert_eq!(ledger.reconcile_conversations().await, 1);
    assert_eq!(ledger.reconcile_users().await, 1);
    assert_eq!(ledger.pending_count(), 0);
}

#[tokio::test]
async fn test_single_pass_drains_n_conversations() {
    const N: usize = 25;

    let mut evictor = MockEvictor::new();
    evictor
        .expect_evict_conversation_details()
        .times(N)
        .returning(|_| Ok(0));
    evictor
        .expect_evict_conversation_messages()
        .times(N)
        .returning(|_| Ok(0));
    evictor.expect_evict_first_pages().times(N).returning(|| Ok(0));

    let ledger = ledger_with(evictor);
    for _ in 0..N {
        ledger.register_pending(
            InvalidationDomain::Conversation,
            Some(Uuid::new_v4()),
            InvalidationEventKind::MessageUpdated,
        );
    }
    assert_eq!(ledger.pending_count(), N);

    assert_eq!(ledger.reconcile_conversations().await, N);
    assert_eq!(ledger.pending_count(), 0);
}

#[tokio::test]
async fn test_registering_same_id_overwrites_kind() {
    let ledger = ledger_with(MockEvictor::new());
    let c1 = Uuid::new_v4();

    ledger.register_pending(
        InvalidationDomain::Conversation,
        Some(c1),
        InvalidationEventKind::MessageCreated,
    );
    ledger.register_pending(
        InvalidationDomain::Conversation,
        Some(Uuid::new_v4()),
        InvalidationEventKind::MessageCreated,
    );
    assert_eq!(ledger.pending_count(), 2);

    ledger.register_pending(
        InvalidationDomain::Conversation,
        Some(c1),
        InvalidationEventKind::MessageDeleted,
    );
    assert_eq!(ledger.pending_count(), 2);
    assert_eq!(
        ledger.pending_kind(InvalidationDomain::Conversation, c1),
        Some(InvalidationEventKind::MessageDeleted)
    );

    // same id in another domain is a separate entry
    ledger.register_pending(
        InvalidationDomain::User,
        Some(c1),
        InvalidationEventKind::MessageDeleted,
    );
    assert_eq!(ledger.pending_count(), 3);
}

#[tokio::test]
async fn test_missing_id_is_ignored() {
    // no expectations: any eviction call fails the test
    let ledger = ledger_with(MockEvictor::new());

    assert!(!ledger.register_pending(
        InvalidationDomain::Message,
        None,
        InvalidationEventKind::MessageUpdated,
    ));
    assert_eq!(ledger.pending_count(), 0);
    assert_eq!(ledger.reconcile_all().await, 0);
}

#[tokio::test]
async fn test_execute_immediate_retries_transient_failure() {
    let c1 = Uuid::new_v4();
    let mut evictor = MockEvictor::new();

    let mut failed_once = false;
    evictor
        .expect_evict_conversation_details()
        .with(eq(c1))
        .times(2)
        .returning(move |_| {
            if failed_once {
                Ok(1)
            } else {
                failed_once = true;
                Err(store_down())
            }
        });
    evictor
        .expect_evict_conversation_messages()
        .times(1)
        .returning(|_| Ok(0));
    evictor.expect_evict_first_pages().times(1).returning(|| Ok(0));

    let ledger = ledger_with(evictor);
    assert!(ledger.execute_immediate(c1).await.is_ok());
    assert_eq!(ledger.pending_count(), 0);
}

#[tokio::test]
async fn test_execute_immediate_gives_up_after_three_attempts() {
    let c1 = Uuid::new_v4();
    let mut evictor = MockEvictor::new();
    evictor
        .expect_evict_conversation_details()
        .times(3)
        .returning(|_| Err(store_down()));
    evictor.expect_evict_conversation_messages().never();
    evictor.expect_evict_first_pages().never();

    let ledger = ledger_with(evictor);
    let result = ledger.execute_immediate(c1).await;

    match result {
        Err(InvalidationError::RetriesExhausted {
            operation,
            entity,
            attempts,
        }) => {
            assert_eq!(operation, "conversation");
            assert_eq!(entity, c1.to_string());
            assert_eq!(attempts, 3);
        }
        other => panic!("expected exhausted retries, got {:?}", other),
    }
    assert_eq!(ledger.pending_count(), 0);
}

#[tokio::test]
async fn test_failed_entries_stay_for_next_pass() {
    let m1 = Uuid::new_v4();
    let mut evictor = MockEvictor::new();

    let mut calls = 0;
    evictor
        .expect_evict_message()
        .with(eq(m1))
        .times(4)
        .returning(move |_| {
            calls += 1;
            if calls <= 3 {
                Err(store_down())
            } else {
                Ok(1)
            }
        });

    let ledger = ledger_with(evictor);
    ledger.register_pending(
        InvalidationDomain::Message,
        Some(m1),
        InvalidationEventKind::MessageImageUploaded,
    );

    assert_eq!(ledger.reconcile_messages().await, 0);
    assert_eq!(ledger.pending_in(InvalidationDomain::Message), 1);

    assert_eq!(ledger.reconcile_messages().await, 1);
    assert_eq!(ledger.pending_count(), 0);
}

#[tokio::test]
async fn test_demote_registers_every_touched_entity() {
    let ledger = ledger_with(MockEvictor::new());
    let target = MessageTarget::new();
    let conversation_id = Uuid::new_v4();

    let event = CacheInvalidationEvent::new(
        InvalidationEventKind::MessageDeleted,
        conversation_id,
        Some(target.id),
        "message-service",
        &target,
    );
    ledger.demote(&event);

    assert_eq!(ledger.pending_in(InvalidationDomain::Conversation), 1);
    assert_eq!(ledger.pending_in(InvalidationDomain::Message), 1);
    assert_eq!(ledger.pending_in(InvalidationDomain::User), 2);
    assert_eq!(
        ledger.pending_kind(InvalidationDomain::User, target.sender_id),
        Some(InvalidationEventKind::MessageDeleted)
    );

    ledger.clear_all();
    assert_eq!(ledger.pending_count(), 0);
}

#[tokio::test]
async fn test_metrics_follow_ledger_state() {
    let u1 = Uuid::new_v4();
    let mut evictor = MockEvictor::new();
    evictor
        .expect_evict_user_conversations()
        .times(1)
        .returning(|_| Ok(0));
    evictor.expect_evict_first_pages().times(1).returning(|| Ok(0));

    let metrics = LedgerMetrics::unregistered("ledger-test");
    let ledger = FallbackLedger::with_metrics(Arc::new(evictor), fast_retry(), metrics.clone());

    ledger.register_pending(
        InvalidationDomain::User,
        Some(u1),
        InvalidationEventKind::ConversationCreated,
    );
    assert_eq!(metrics.pending.get(), 1);

    let snapshot = ledger.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].domain, InvalidationDomain::User);
    assert_eq!(snapshot[0].entity_id, u1);
    assert_eq!(snapshot[0].kind, InvalidationEventKind::ConversationCreated);

    ledger.reconcile_users().await;
    assert_eq!(metrics.pending.get(), 0);
    assert_eq!(metrics.reconciled.get(), 1);
    assert_eq!(metrics.oldest_pending_age_seconds.get(), 0);
}

#[tokio::test]
async fn test_registration_updates_pending_gauge_only() {
    // no expectations: nothing here may reach the evictor
    let metrics = LedgerMetrics::unregistered("ledger-test");
    let ledger =
        FallbackLedger::with_metrics(Arc::new(MockEvictor::new()), fast_retry(), metrics.clone());
    metrics.oldest_pending_age_seconds.set(-1);

    for _ in 0..50 {
        let target = MessageTarget::new();
        ledger.demote(&CacheInvalidationEvent::new(
            InvalidationEventKind::MessageCreated,
            Uuid::new_v4(),
            Some(target.id),
            "message-service",
            &target,
        ));
    }

    assert_eq!(metrics.pending.get(), 200);
    assert_eq!(metrics.demoted.get(), 50);
    // the age gauge is only recomputed by a refresh
    assert_eq!(metrics.oldest_pending_age_seconds.get(), -1);

    ledger.refresh_metrics();
    assert_eq!(metrics.oldest_pending_age_seconds.get(), 0);
    assert!(ledger.metrics().is_some());
}

#[test]
fn test_oldest_registered_at_spans_domains() {
    let ledger = ledger_with(MockEvictor::new());
    assert!(ledger.oldest_registered_at().is_none());

    let c1 = Uuid::new_v4();
    ledger.register_pending(
        InvalidationDomain::Conversation,
        Some(c1),
        InvalidationEventKind::MessageCreated,
    );
    std::thread::sleep(std::time::Duration::from_millis(5));
    ledger.register_pending(
        InvalidationDomain::User,
        Some(Uuid::new_v4()),
        InvalidationEventKind::MessagesRead,
    );

    let first = ledger
        .snapshot()
        .into_iter()
        .find(|entry| entry.entity_id == c1)
        .unwrap()
        .registered_at;
    assert_eq!(ledger.oldest_registered_at(), Some(first));

    ledger.clear_all();
    assert!(ledger.oldest_registered_at().is_none());
}
