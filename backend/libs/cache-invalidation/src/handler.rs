//! Maps each invalidation kind to the evictions it requires

use crate::adapter::CacheEvictor;
use crate::event::{participant_label, CacheInvalidationEvent, InvalidationEventKind};
use crate::InvalidationResult;
use std::sync::Arc;
use tracing::debug;

/// Listener that applies one event to the cache
#[derive(Clone)]
pub struct InvalidationHandler {
    evictor: Arc<dyn CacheEvictor>,
}

impl InvalidationHandler {
    pub fn new(evictor: Arc<dyn CacheEvictor>) -> Self {
        Self { evictor }
    }

    /// Run every eviction the event calls for; the first failure aborts the rest.
    pub async fn handle(&self, event: &CacheInvalidationEvent) -> InvalidationResult<()> {
        debug!(
            kind = %event.kind,
            conversation_id = %event.conversation_id,
            message_id = ?event.message_id,
            sender_id = %participant_label(event.sender_id),
            receiver_id = %participant_label(event.receiver_id),
            source = %event.source_ref,
            target = %event.target_ref,
            "Handling cache invalidation"
        );

        let evictor = &self.evictor;
        let conversation_id = event.conversation_id;

        match event.kind {
            InvalidationEventKind::MessageCreated => {
                evictor.evict_conversation_details(conversation_id).await?;
                evictor.evict_conversation_messages(conversation_id).await?;
                self.evict_participants(event).await?;
                evictor.evict_first_pages().await?;
            }
            InvalidationEventKind::MessageUpdated | InvalidationEventKind::MessageImageUploaded => {
                if let Some(message_id) = event.message_id {
                    evictor.evict_message(message_id).await?;
                }
                evictor.evict_conversation_messages(conversation_id).await?;
            }
            InvalidationEventKind::MessageDeleted => {
                if let Some(message_id) = event.message_id {
                    evictor.evict_message(message_id).await?;
                }
                evictor.evict_conversation_messages(conversation_id).await?;
                evictor.evict_conversation_details(conversation_id).await?;
                self.evict_participants(event).await?;
                evictor.evict_first_pages().await?;
            }
            InvalidationEventKind::ConversationCreated => {
                match (event.sender_id, event.receiver_id) {
                    (Some(a), Some(b)) if a != b => {
                        evictor.evict_conversation_between_users(a, b).await?;
                    }
                    _ => self.evict_participants(event).await?,
                }
                evictor.evict_first_pages().await?;
            }
            InvalidationEventKind::MessagesRead => {
                evictor.evict_conversation_details(conversation_id).await?;
                self.evict_participants(event).await?;
                evictor.evict_first_pages().await?;
            }
        }

        Ok(())
    }

    async fn evict_participants(&self, event: &CacheInvalidationEvent) -> InvalidationResult<()> {
        for user_id in event.participants() {
            self.evictor.evict_user_conversations(user_id).await?;
        }
        Ok(())
    }
}
