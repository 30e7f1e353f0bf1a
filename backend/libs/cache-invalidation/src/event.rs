//! Invalidation events and the shapes they are derived from

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Mutation kinds that can stale cached conversation data
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InvalidationEventKind {
    MessageCreated,
    MessageUpdated,
    MessageDeleted,
    MessageImageUploaded,
    ConversationCreated,
    MessagesRead,
}

impl fmt::Display for InvalidationEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InvalidationEventKind::MessageCreated => "message_created",
            InvalidationEventKind::MessageUpdated => "message_updated",
            InvalidationEventKind::MessageDeleted => "message_deleted",
            InvalidationEventKind::MessageImageUploaded => "message_image_uploaded",
            InvalidationEventKind::ConversationCreated => "conversation_created",
            InvalidationEventKind::MessagesRead => "messages_read",
        };
        f.write_str(name)
    }
}

/// Ledger partition an entity id belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InvalidationDomain {
    Conversation,
    Message,
    User,
}

impl fmt::Display for InvalidationDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidationDomain::Conversation => write!(f, "conversation"),
            InvalidationDomain::Message => write!(f, "message"),
            InvalidationDomain::User => write!(f, "user"),
        }
    }
}

/// Anything a business mutation can pass as the event target.
///
/// Only message-shaped targets know their participants; every other shape
/// keeps the defaults and resolves to unknown sender/receiver.
pub trait InvalidationTarget {
    /// Short reference used in logs, e.g. `message:{id}`
    fn target_ref(&self) -> String;

    fn sender_id(&self) -> Option<Uuid> {
        None
    }

    fn receiver_id(&self) -> Option<Uuid> {
        None
    }
}

/// Transient payload describing one business mutation.
///
/// Built once per mutation and consumed once by dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheInvalidationEvent {
    pub kind: InvalidationEventKind,
    pub conversation_id: Uuid,
    pub message_id: Option<Uuid>,
    pub sender_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub source_ref: String,
    pub target_ref: String,
}

impl CacheInvalidationEvent {
    /// Build an event, extracting participants from the target
    pub fn new<T: InvalidationTarget + ?Sized>(
        kind: InvalidationEventKind,
        conversation_id: Uuid,
        message_id: Option<Uuid>,
        source: &str,
        target: &T,
    ) -> Self {
        Self {
            kind,
            conversation_id,
            message_id,
            sender_id: target.sender_id(),
            receiver_id: target.receiver_id(),
            source_ref: source.to_string(),
            target_ref: target.target_ref(),
        }
    }

    /// Override participants known from the call site rather than the target
    pub fn with_participants(mut self, sender_id: Option<Uuid>, receiver_id: Option<Uuid>) -> Self {
        if sender_id.is_some() {
            self.sender_id = sender_id;
        }
        if receiver_id.is_some() {
            self.receiver_id = receiver_id;
        }
        self
    }

    /// Known participants, sender first, duplicates removed
    pub fn participants(&self) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(2);
        for id in [self.sender_id, self.receiver_id].into_iter().flatten() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

/// Renders an optional participant the way logs show it
pub fn participant_label(id: Option<Uuid>) -> String {
    id.map(|id| id.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
