//! Message module - message value types and the deduplicating message log.

mod log;
mod message;

pub use log::MessageLog;
pub use message::{
    DeliveryStatus, IncomingMessage, MessagePatch, MessagePayload, OutgoingMessage, QuickReply,
    RenderHandle, Sender, StoredMessage, GENUI_MESSAGE_TYPE, TEXT_MESSAGE_TYPE,
};
