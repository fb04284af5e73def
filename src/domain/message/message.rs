//! Message value types flowing through the engine.
//!
//! - `OutgoingMessage` - built by the caller, handed to the transport
//! - `IncomingMessage` - produced by the transport
//! - `StoredMessage` - what the message log holds and the UI renders

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::{MessageId, Timestamp};

/// Open key/value payload carried by every message.
pub type MessagePayload = Map<String, Value>;

/// Message type tag for plain text messages.
pub const TEXT_MESSAGE_TYPE: &str = "text";

/// Message type tag for streamed GenUI replies.
pub const GENUI_MESSAGE_TYPE: &str = "genui";

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// Delivery progress of a message the user sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Read,
    /// The transport rejected the send.
    Failed,
}

/// A quick-reply button attached to a bot message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickReply {
    pub label: String,
    pub value: String,
}

/// Opaque reference to whatever renders a message. Stored and forwarded,
/// never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderHandle(String);

impl RenderHandle {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A message on its way to the transport. Immutable once sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub id: MessageId,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub data: MessagePayload,
    pub timestamp: Timestamp,
}

impl OutgoingMessage {
    /// Creates a message with a generated id and the current time.
    pub fn new(message_type: impl Into<String>, data: MessagePayload) -> Self {
        Self {
            id: MessageId::generate(),
            message_type: message_type.into(),
            data,
            timestamp: Timestamp::now(),
        }
    }

    /// Creates a `"text"` message with `data.text` set.
    pub fn text(text: impl Into<String>) -> Self {
        let mut data = MessagePayload::new();
        data.insert("text".to_string(), Value::String(text.into()));
        Self::new(TEXT_MESSAGE_TYPE, data)
    }

    /// Replaces the generated id.
    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.id = id.into();
        self
    }
}

/// A message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: MessageId,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub data: MessagePayload,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<QuickReply>,
}

impl IncomingMessage {
    pub fn new(id: impl Into<MessageId>, message_type: impl Into<String>, data: MessagePayload) -> Self {
        Self {
            id: id.into(),
            message_type: message_type.into(),
            data,
            timestamp: Timestamp::now(),
            sender: None,
            actions: Vec::new(),
        }
    }

    /// Creates a `"text"` message with `data.text` set.
    pub fn text(id: impl Into<MessageId>, text: impl Into<String>) -> Self {
        let mut data = MessagePayload::new();
        data.insert("text".to_string(), Value::String(text.into()));
        Self::new(id, TEXT_MESSAGE_TYPE, data)
    }

    pub fn with_sender(mut self, sender: Sender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_actions(mut self, actions: Vec<QuickReply>) -> Self {
        self.actions = actions;
        self
    }
}

/// A message held by the message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub data: MessagePayload,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Sender>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<QuickReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render: Option<RenderHandle>,
}

impl StoredMessage {
    /// Echo of a user's own send, tagged `from: user` with status `sending`.
    pub fn from_outgoing(message: OutgoingMessage) -> Self {
        Self {
            id: message.id,
            message_type: message.message_type,
            data: message.data,
            timestamp: message.timestamp,
            sender: Some(Sender::User),
            actions: Vec::new(),
            status: Some(DeliveryStatus::Sending),
            render: None,
        }
    }

    /// Stores a transport message as-is, keeping whatever sender it carried.
    pub fn from_incoming(message: IncomingMessage) -> Self {
        Self {
            id: message.id,
            message_type: message.message_type,
            data: message.data,
            timestamp: message.timestamp,
            sender: message.sender,
            actions: message.actions,
            status: None,
            render: None,
        }
    }

    pub fn with_render(mut self, render: RenderHandle) -> Self {
        self.render = Some(render);
        self
    }

    /// Returns `data.text` when present.
    pub fn text(&self) -> Option<&str> {
        self.data.get("text").and_then(Value::as_str)
    }
}

/// Field-wise update for `MessageLog::update_by_id`. Each `Some` field
/// replaces the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    pub status: Option<DeliveryStatus>,
    pub data: Option<MessagePayload>,
    pub actions: Option<Vec<QuickReply>>,
    pub render: Option<RenderHandle>,
}

impl MessagePatch {
    pub fn status(status: DeliveryStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn data(data: MessagePayload) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, message: &mut StoredMessage) {
        if let Some(status) = self.status {
            message.status = Some(status);
        }
        if let Some(data) = self.data {
            message.data = data;
        }
        if let Some(actions) = self.actions {
            message.actions = actions;
        }
        if let Some(render) = self.render {
            message.render = Some(render);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outgoing_text_sets_type_and_payload() {
        let msg = OutgoingMessage::text("hi");
        assert_eq!(msg.message_type, "text");
        assert_eq!(msg.data.get("text"), Some(&json!("hi")));
    }

    #[test]
    fn from_outgoing_marks_user_and_sending() {
        let stored = StoredMessage::from_outgoing(OutgoingMessage::text("hi").with_id("m1"));
        assert_eq!(stored.id, MessageId::new("m1"));
        assert_eq!(stored.sender, Some(Sender::User));
        assert_eq!(stored.status, Some(DeliveryStatus::Sending));
        assert_eq!(stored.text(), Some("hi"));
    }

    #[test]
    fn incoming_deserializes_wire_shape() {
        let msg: IncomingMessage = serde_json::from_value(json!({
            "id": "b1",
            "type": "text",
            "data": {"text": "hello"},
            "timestamp": "2024-01-15T10:30:00Z",
            "sender": "bot",
            "actions": [{"label": "Yes", "value": "yes"}]
        }))
        .unwrap();

        assert_eq!(msg.sender, Some(Sender::Bot));
        assert_eq!(msg.actions.len(), 1);
    }

    #[test]
    fn patch_only_touches_provided_fields() {
        let mut stored = StoredMessage::from_outgoing(OutgoingMessage::text("hi"));
        MessagePatch::status(DeliveryStatus::Read).apply(&mut stored);

        assert_eq!(stored.status, Some(DeliveryStatus::Read));
        assert_eq!(stored.text(), Some("hi"));
    }
}
