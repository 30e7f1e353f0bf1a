//! Event Publisher
//!
//! Entry point for business services. Each `publish_*` call builds a
//! [`CacheInvalidationEvent`] and routes it through commit-aware dispatch:
//!
//! ```text
//! message_service (inside its transaction)
//!   publisher.publish_message_created(Some(&scope), ...)
//!     -> scope.register_after_commit(dispatch)
//! tx.commit() succeeds
//!   scope.commit()
//!     -> dispatcher.dispatch(event)       (queue, never blocks)
//!        -> worker: handler.handle(event) (evictions)
//!           -> on error: ledger.demote(event)
//! ```
//!
//! Nothing here returns an error to the caller. A rolled-back scope drops
//! the event, so no eviction and no ledger entry happen for it.

use crate::dispatch::InvalidationDispatcher;
use crate::event::{CacheInvalidationEvent, InvalidationEventKind, InvalidationTarget};
use crate::ledger::FallbackLedger;
use crate::transaction::TransactionScope;
use crate::InvalidationResult;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Publisher for cache invalidation events
#[derive(Clone)]
pub struct CacheEventPublisher {
    dispatcher: InvalidationDispatcher,
}

impl CacheEventPublisher {
    pub fn new(dispatcher: InvalidationDispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn publish_message_created<T: InvalidationTarget + ?Sized>(
        &self,
        scope: Option<&TransactionScope>,
        source: &str,
        target: &T,
        conversation_id: Uuid,
        message_id: Option<Uuid>,
    ) {
        self.publish(
            scope,
            CacheInvalidationEvent::new(
                InvalidationEventKind::MessageCreated,
                conversation_id,
                message_id,
                source,
                target,
            ),
        );
    }

    pub fn publish_message_updated<T: InvalidationTarget + ?Sized>(
        &self,
        scope: Option<&TransactionScope>,
        source: &str,
        target: &T,
        conversation_id: Uuid,
        message_id: Option<Uuid>,
    ) {
        self.publish(
            scope,
            CacheInvalidationEvent::new(
                InvalidationEventKind::MessageUpdated,
                conversation_id,
                message_id,
                source,
                target,
            ),
        );
    }

    pub fn publish_message_deleted<T: InvalidationTarget + ?Sized>(
        &self,
        scope: Option<&TransactionScope>,
        source: &str,
        target: &T,
        conversation_id: Uuid,
        message_id: Option<Uuid>,
    ) {
        self.publish(
            scope,
            CacheInvalidationEvent::new(
                InvalidationEventKind::MessageDeleted,
                conversation_id,
                message_id,
                source,
                target,
            ),
        );
    }

    pub fn publish_message_image_uploaded<T: InvalidationTarget + ?Sized>(
        &self,
        scope: Option<&TransactionScope>,
        source: &str,
        target: &T,
        conversation_id: Uuid,
        message_id: Option<Uuid>,
    ) {
        self.publish(
            scope,
            CacheInvalidationEvent::new(
                InvalidationEventKind::MessageImageUploaded,
                conversation_id,
                message_id,
                source,
                target,
            ),
        );
    }

    /// The two participants are passed explicitly since a conversation
    /// target carries no sender/receiver of its own.
    pub fn publish_conversation_created<T: InvalidationTarget + ?Sized>(
        &self,
        scope: Option<&TransactionScope>,
        source: &str,
        target: &T,
        conversation_id: Uuid,
        initiator_id: Option<Uuid>,
        recipient_id: Option<Uuid>,
    ) {
        self.publish(
            scope,
            CacheInvalidationEvent::new(
                InvalidationEventKind::ConversationCreated,
                conversation_id,
                None,
                source,
                target,
            )
            .with_participants(initiator_id, recipient_id),
        );
    }

    /// `reader_id` is recorded as the receiver when the target does not name one.
    pub fn publish_messages_read<T: InvalidationTarget + ?Sized>(
        &self,
        scope: Option<&TransactionScope>,
        source: &str,
        target: &T,
        conversation_id: Uuid,
        reader_id: Option<Uuid>,
    ) {
        let mut event = CacheInvalidationEvent::new(
            InvalidationEventKind::MessagesRead,
            conversation_id,
            None,
            source,
            target,
        );
        if event.receiver_id.is_none() {
            event.receiver_id = reader_id;
        }
        self.publish(scope, event);
    }

    pub fn pending_invalidations_count(&self) -> usize {
        self.ledger().pending_count()
    }

    pub fn clear_all_pending_invalidations(&self) {
        self.ledger().clear_all();
    }

    pub async fn execute_immediate_invalidation(
        &self,
        conversation_id: Uuid,
    ) -> InvalidationResult<()> {
        self.ledger().execute_immediate(conversation_id).await
    }

    pub fn ledger(&self) -> &Arc<FallbackLedger> {
        self.dispatcher.ledger()
    }

    fn publish(&self, scope: Option<&TransactionScope>, event: CacheInvalidationEvent) {
        let Some(scope) = scope else {
            warn!(
                kind = %event.kind,
                conversation_id = %event.conversation_id,
                "No active transaction, dispatching cache invalidation immediately"
            );
            self.dispatcher.dispatch(event);
            return;
        };

        let kind = event.kind;
        let conversation_id = event.conversation_id;
        let dispatcher = self.dispatcher.clone();

        match scope.register_after_commit(Box::new(move || dispatcher.dispatch(event))) {
            Ok(()) => debug!(
                kind = %kind,
                conversation_id = %conversation_id,
                "Cache invalidation deferred until commit"
            ),
            Err(action) => {
                warn!(
                    kind = %kind,
                    conversation_id = %conversation_id,
                    "Transaction already completed, dispatching cache invalidation immediately"
                );
                action();
            }
        }
    }
}
