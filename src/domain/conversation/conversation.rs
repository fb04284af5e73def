//! Conversation entity and its status.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::domain::foundation::{ConversationId, Timestamp};

/// Lifecycle status of a conversation, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    #[default]
    Open,
    Pending,
    Resolved,
    Closed,
}

impl ConversationStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, ConversationStatus::Closed)
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversationStatus::Open => "open",
            ConversationStatus::Pending => "pending",
            ConversationStatus::Resolved => "resolved",
            ConversationStatus::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// One logical conversation multiplexed over the engine's transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<u32>,
    #[serde(default)]
    pub status: ConversationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Conversation {
    /// Creates an open conversation with only the required fields set.
    pub fn new(id: impl Into<ConversationId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            contact: None,
            avatar: None,
            last_message: None,
            last_message_at: None,
            unread_count: None,
            status: ConversationStatus::Open,
            metadata: None,
        }
    }

    pub fn with_status(mut self, status: ConversationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_unread(mut self, count: u32) -> Self {
        self.unread_count = Some(count);
        self
    }
}

/// Partial update for a conversation. Each `Some` field replaces the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ConversationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ConversationPatch {
    pub fn status(status: ConversationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn unread_count(count: u32) -> Self {
        Self {
            unread_count: Some(count),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, conversation: &mut Conversation) {
        if let Some(title) = self.title {
            conversation.title = title;
        }
        if let Some(contact) = self.contact {
            conversation.contact = Some(contact);
        }
        if let Some(avatar) = self.avatar {
            conversation.avatar = Some(avatar);
        }
        if let Some(last_message) = self.last_message {
            conversation.last_message = Some(last_message);
        }
        if let Some(at) = self.last_message_at {
            conversation.last_message_at = Some(at);
        }
        if let Some(count) = self.unread_count {
            conversation.unread_count = Some(count);
        }
        if let Some(status) = self.status {
            conversation.status = status;
        }
        if let Some(metadata) = self.metadata {
            conversation.metadata = Some(metadata);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_conversation_is_open() {
        let conv = Conversation::new("c1", "Support");
        assert_eq!(conv.status, ConversationStatus::Open);
        assert!(!conv.status.is_closed());
    }

    #[test]
    fn patch_replaces_only_given_fields() {
        let mut conv = Conversation::new("c1", "Support").with_unread(4);
        ConversationPatch::status(ConversationStatus::Resolved).apply(&mut conv);

        assert_eq!(conv.status, ConversationStatus::Resolved);
        assert_eq!(conv.unread_count, Some(4));
        assert_eq!(conv.title, "Support");
    }

    #[test]
    fn deserializes_camel_case_wire_shape() {
        let conv: Conversation = serde_json::from_value(json!({
            "id": "c9",
            "title": "Billing",
            "unreadCount": 2,
            "status": "pending"
        }))
        .unwrap();

        assert_eq!(conv.unread_count, Some(2));
        assert_eq!(conv.status, ConversationStatus::Pending);
    }
}
