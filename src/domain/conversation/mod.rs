//! Conversation module - conversations and the registry that tracks them.

mod conversation;
mod registry;

pub use conversation::{Conversation, ConversationPatch, ConversationStatus};
pub use registry::ConversationRegistry;
