//! Widget event ports - the observability bus consumers subscribe to.
//!
//! The engine publishes a `WidgetEvent` for everything a host page might want
//! to react to (analytics, badges, logging). Delivery is synchronous.

use serde::Serialize;
use std::sync::Arc;

use crate::domain::foundation::{ConnectionStatus, MessageId, StreamId};
use crate::domain::message::{MessagePayload, StoredMessage};

/// Events published by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetEvent {
    WidgetOpened,
    WidgetClosed,
    MessageSent {
        message: StoredMessage,
    },
    MessageReceived {
        message: StoredMessage,
    },
    FileUploaded {
        name: String,
        content_type: String,
        size: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<MessagePayload>,
    },
    ConnectorStatusChanged {
        status: ConnectionStatus,
    },
    GenUiStreamStarted {
        stream_id: StreamId,
        message_id: MessageId,
    },
    GenUiStreamCompleted {
        stream_id: StreamId,
        message_id: MessageId,
    },
    HistoryLoaded {
        count: usize,
        has_more: bool,
    },
    SearchQueryChanged {
        query: String,
    },
}

impl WidgetEvent {
    pub fn kind(&self) -> WidgetEventKind {
        match self {
            WidgetEvent::WidgetOpened => WidgetEventKind::WidgetOpened,
            WidgetEvent::WidgetClosed => WidgetEventKind::WidgetClosed,
            WidgetEvent::MessageSent { .. } => WidgetEventKind::MessageSent,
            WidgetEvent::MessageReceived { .. } => WidgetEventKind::MessageReceived,
            WidgetEvent::FileUploaded { .. } => WidgetEventKind::FileUploaded,
            WidgetEvent::ConnectorStatusChanged { .. } => WidgetEventKind::ConnectorStatusChanged,
            WidgetEvent::GenUiStreamStarted { .. } => WidgetEventKind::GenUiStreamStarted,
            WidgetEvent::GenUiStreamCompleted { .. } => WidgetEventKind::GenUiStreamCompleted,
            WidgetEvent::HistoryLoaded { .. } => WidgetEventKind::HistoryLoaded,
            WidgetEvent::SearchQueryChanged { .. } => WidgetEventKind::SearchQueryChanged,
        }
    }
}

/// Discriminant of `WidgetEvent`, used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetEventKind {
    WidgetOpened,
    WidgetClosed,
    MessageSent,
    MessageReceived,
    FileUploaded,
    ConnectorStatusChanged,
    GenUiStreamStarted,
    GenUiStreamCompleted,
    HistoryLoaded,
    SearchQueryChanged,
}

/// Consumer of widget events.
pub trait WidgetEventHandler: Send + Sync {
    fn handle(&self, event: &WidgetEvent);

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

/// Port for publishing widget events.
pub trait WidgetEventPublisher: Send + Sync {
    fn publish(&self, event: WidgetEvent);
}

/// Port for subscribing to widget events.
pub trait WidgetEventSubscriber: Send + Sync {
    /// Subscribes `handler` to `kind`. Subscribing the same handler (same
    /// `Arc`) to the same kind again has no effect.
    fn subscribe(&self, kind: WidgetEventKind, handler: Arc<dyn WidgetEventHandler>);

    /// Removes `handler` from `kind`. Returns whether it was subscribed.
    fn unsubscribe(&self, kind: WidgetEventKind, handler: &Arc<dyn WidgetEventHandler>) -> bool;
}

/// Combined publish/subscribe bus.
pub trait WidgetEventBus: WidgetEventPublisher + WidgetEventSubscriber {}

impl<T: WidgetEventPublisher + WidgetEventSubscriber> WidgetEventBus for T {}
