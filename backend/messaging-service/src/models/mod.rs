pub mod conversation;
pub mod message;

pub use conversation::{Conversation, ConversationType};
pub use message::{Message, MessageResponse};
