use cache_invalidation::InvalidationTarget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted message row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub image_url: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// API projection of a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub image_url: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessageResponse {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content.clone(),
            image_url: message.image_url.clone(),
            is_read: message.is_read,
            created_at: message.created_at,
        }
    }
}

impl InvalidationTarget for Message {
    fn target_ref(&self) -> String {
        format!("message:{}", self.id)
    }

    fn sender_id(&self) -> Option<Uuid> {
        Some(self.sender_id)
    }

    fn receiver_id(&self) -> Option<Uuid> {
        Some(self.receiver_id)
    }
}

impl InvalidationTarget for MessageResponse {
    fn target_ref(&self) -> String {
        format!("message_response:{}", self.id)
    }

    fn sender_id(&self) -> Option<Uuid> {
        Some(self.sender_id)
    }

    fn receiver_id(&self) -> Option<Uuid> {
        Some(self.receiver_id)
    }
}
