//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between the
//! engine and the outside world. Adapters implement these ports.
//!
//! - `ChatTransport` - the backend connection (socket, polling, mock)
//! - `WidgetEventPublisher` / `WidgetEventSubscriber` - the observability bus

mod transport;
mod widget_events;

pub use transport::{
    Attachment, ChatTransport, ChunkHandler, ConnectHandler, ConversationUpdateHandler,
    DisconnectHandler, DisconnectReason, Feedback, HistoryPage, MessageHandler,
    MessageStatusHandler, TransportCapabilities, TransportError, TypingHandler,
};
pub use widget_events::{
    WidgetEvent, WidgetEventBus, WidgetEventHandler, WidgetEventKind, WidgetEventPublisher,
    WidgetEventSubscriber,
};
