//! ChatTransport port - the contract every backend adapter implements.
//!
//! Adapters (socket, polling, mock) translate between a concrete backend and
//! the engine. Three calls are mandatory: `connect`, `disconnect`, and
//! `send_message`, plus the `on_message`/`on_disconnect` callbacks. Everything
//! else is an optional capability. Adapters advertise what they support
//! through `capabilities()`, and the engine never calls an unadvertised
//! capability.
//!
//! # Callbacks
//!
//! The engine registers callbacks once, during `init`. Adapters invoke them
//! synchronously, in arrival order, from whatever task receives backend data.
//!
//! # Example
//!
//! ```ignore
//! #[async_trait]
//! impl ChatTransport for SocketTransport {
//!     async fn connect(&self) -> Result<(), TransportError> { /* open socket */ }
//!     async fn disconnect(&self) -> Result<(), TransportError> { /* close */ }
//!     async fn send_message(&self, message: &OutgoingMessage) -> Result<(), TransportError> {
//!         self.socket.send(serde_json::to_string(message)?).await
//!     }
//!     fn on_message(&self, handler: MessageHandler) { *self.on_message.lock() = Some(handler); }
//!     fn on_disconnect(&self, handler: DisconnectHandler) { /* ... */ }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::conversation::{Conversation, ConversationPatch};
use crate::domain::foundation::{ConversationId, MessageId, StreamId};
use crate::domain::genui::AIChunk;
use crate::domain::message::{DeliveryStatus, IncomingMessage, MessagePayload, OutgoingMessage};

/// Called for every message the backend delivers.
pub type MessageHandler = Arc<dyn Fn(IncomingMessage) + Send + Sync>;

/// Called when the connection drops, with the reason if known.
pub type DisconnectHandler = Arc<dyn Fn(DisconnectReason) + Send + Sync>;

/// Called when the adapter (re)establishes its connection on its own.
pub type ConnectHandler = Arc<dyn Fn() + Send + Sync>;

/// Called when the remote side starts or stops typing.
pub type TypingHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Called when the backend reports delivery progress of a sent message.
pub type MessageStatusHandler = Arc<dyn Fn(MessageId, DeliveryStatus) + Send + Sync>;

/// Called for each GenUI chunk: `(stream_id, chunk, done)`.
pub type ChunkHandler = Arc<dyn Fn(StreamId, AIChunk, bool) + Send + Sync>;

/// Called when the backend changes a conversation.
pub type ConversationUpdateHandler = Arc<dyn Fn(ConversationId, ConversationPatch) + Send + Sync>;

/// Port for chat backend transports.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Opens the connection.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Closes the connection. Adapters report the resulting disconnect with
    /// `DisconnectReason::User`.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Delivers a user message to the backend.
    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), TransportError>;

    fn on_message(&self, handler: MessageHandler);

    fn on_disconnect(&self, handler: DisconnectHandler);

    fn on_connect(&self, _handler: ConnectHandler) {}

    fn on_typing(&self, _handler: TypingHandler) {}

    fn on_message_status(&self, _handler: MessageStatusHandler) {}

    fn on_genui_chunk(&self, _handler: ChunkHandler) {}

    /// Only called when `capabilities().conversation_updates` is set.
    fn on_conversation_update(&self, _handler: ConversationUpdateHandler) {}

    /// Optional capabilities this adapter implements.
    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities::default()
    }

    /// Whether the engine echoes the user's own sends into the message log.
    fn add_sent_to_history(&self) -> bool {
        true
    }

    async fn send_feedback(&self, _message_id: &MessageId, _feedback: Feedback) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("send_feedback"))
    }

    async fn send_file(
        &self,
        _file: &Attachment,
        _metadata: Option<&MessagePayload>,
    ) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("send_file"))
    }

    /// Loads the page of history older than `cursor` (newest page when `None`).
    async fn load_history(&self, _cursor: Option<&str>) -> Result<HistoryPage, TransportError> {
        Err(TransportError::Unsupported("load_history"))
    }

    /// Forwards a UI component event back to the stream that rendered it.
    async fn receive_component_event(
        &self,
        _stream_id: &StreamId,
        _event_type: &str,
        _payload: &Value,
    ) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("receive_component_event"))
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, TransportError> {
        Err(TransportError::Unsupported("list_conversations"))
    }

    async fn create_conversation(
        &self,
        _title: Option<&str>,
        _metadata: Option<&MessagePayload>,
    ) -> Result<Conversation, TransportError> {
        Err(TransportError::Unsupported("create_conversation"))
    }

    async fn switch_conversation(&self, _id: &ConversationId) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("switch_conversation"))
    }

    async fn close_conversation(&self, _id: &ConversationId) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("close_conversation"))
    }
}

/// Optional transport capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportCapabilities {
    pub feedback: bool,
    pub file_upload: bool,
    pub history: bool,
    pub component_events: bool,
    pub list_conversations: bool,
    pub create_conversation: bool,
    pub switch_conversation: bool,
    pub close_conversation: bool,
    pub conversation_updates: bool,
}

impl TransportCapabilities {
    /// No optional capabilities.
    pub fn none() -> Self {
        Self::default()
    }

    /// Every optional capability.
    pub fn all() -> Self {
        Self {
            feedback: true,
            file_upload: true,
            history: true,
            component_events: true,
            list_conversations: true,
            create_conversation: true,
            switch_conversation: true,
            close_conversation: true,
            conversation_updates: true,
        }
    }

    /// Every multi-conversation capability.
    pub fn conversations() -> Self {
        Self {
            list_conversations: true,
            create_conversation: true,
            switch_conversation: true,
            close_conversation: true,
            conversation_updates: true,
            ..Self::default()
        }
    }
}

/// Why the connection dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The caller asked for it (`disconnect()`); never retried.
    User,
    Server,
    Network,
    Other(String),
}

impl DisconnectReason {
    pub fn is_user_initiated(&self) -> bool {
        matches!(self, DisconnectReason::User)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::User => write!(f, "user"),
            DisconnectReason::Server => write!(f, "server"),
            DisconnectReason::Network => write!(f, "network"),
            DisconnectReason::Other(reason) => write!(f, "{}", reason),
        }
    }
}

/// Rating a user gives a bot message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Like,
    Dislike,
}

/// A file the user uploads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }
}

/// One page of older messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    /// Oldest first.
    pub messages: Vec<IncomingMessage>,
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Errors reported by transport adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Transport does not support {0}")]
    Unsupported(&'static str),

    #[error("Transport is closed")]
    Closed,

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        TransportError::ConnectionFailed(reason.into())
    }

    pub fn send_failed(reason: impl Into<String>) -> Self {
        TransportError::SendFailed(reason.into())
    }
}
