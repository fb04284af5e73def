//! Streamed GenUI chunks and the accumulated stream state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::message::MessagePayload;

/// One increment of a streamed bot reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AIChunk {
    /// Text to append to the reply.
    Text { id: u64, content: String },

    /// A UI component to render with the given props.
    Ui {
        id: u64,
        component: String,
        #[serde(default)]
        props: Map<String, Value>,
    },

    /// A backend-originated event for UI components. Never rendered.
    Event {
        id: u64,
        name: String,
        #[serde(default)]
        payload: Value,
        /// Optional ui-chunk id the event is aimed at.
        #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
}

impl AIChunk {
    pub fn text(id: u64, content: impl Into<String>) -> Self {
        AIChunk::Text {
            id,
            content: content.into(),
        }
    }

    pub fn ui(id: u64, component: impl Into<String>, props: Map<String, Value>) -> Self {
        AIChunk::Ui {
            id,
            component: component.into(),
            props,
        }
    }

    pub fn event(id: u64, name: impl Into<String>, payload: Value) -> Self {
        AIChunk::Event {
            id,
            name: name.into(),
            payload,
            target: None,
        }
    }

    /// Aims an event chunk at a ui-chunk id. No effect on other variants.
    pub fn targeting(mut self, ui_id: impl Into<String>) -> Self {
        if let AIChunk::Event { target, .. } = &mut self {
            *target = Some(ui_id.into());
        }
        self
    }

    pub fn id(&self) -> u64 {
        match self {
            AIChunk::Text { id, .. } | AIChunk::Ui { id, .. } | AIChunk::Event { id, .. } => *id,
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self, AIChunk::Event { .. })
    }
}

/// Accumulated content of one stream: the `data` of its `"genui"` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamState {
    #[serde(default)]
    pub chunks: Vec<AIChunk>,
    #[serde(default)]
    pub streaming_complete: bool,
}

impl StreamState {
    /// Returns true if a chunk with `id` was already appended.
    pub fn contains(&self, id: u64) -> bool {
        self.chunks.iter().any(|c| c.id() == id)
    }

    /// Concatenated content of every text chunk.
    pub fn text(&self) -> String {
        self.chunks
            .iter()
            .filter_map(|c| match c {
                AIChunk::Text { content, .. } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn to_payload(&self) -> MessagePayload {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => MessagePayload::new(),
        }
    }

    /// Reads a state back out of a message payload. Malformed payloads yield `None`.
    pub fn from_payload(payload: &MessagePayload) -> Option<Self> {
        serde_json::from_value(Value::Object(payload.clone())).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_chunk_uses_for_on_the_wire() {
        let chunk: AIChunk = serde_json::from_value(json!({
            "type": "event",
            "id": 4,
            "name": "highlight",
            "payload": {"row": 2},
            "for": "3"
        }))
        .unwrap();

        assert_eq!(
            chunk,
            AIChunk::event(4, "highlight", json!({"row": 2})).targeting("3")
        );
    }

    #[test]
    fn targeting_ignores_non_event_chunks() {
        assert_eq!(AIChunk::text(1, "a").targeting("x"), AIChunk::text(1, "a"));
    }

    #[test]
    fn payload_uses_camel_case_keys() {
        let state = StreamState {
            chunks: vec![AIChunk::text(1, "hi")],
            streaming_complete: true,
        };
        let payload = state.to_payload();

        assert_eq!(payload.get("streamingComplete"), Some(&json!(true)));
        assert_eq!(StreamState::from_payload(&payload), Some(state));
    }

    #[test]
    fn text_joins_text_chunks_only() {
        let state = StreamState {
            chunks: vec![
                AIChunk::text(1, "Hello, "),
                AIChunk::ui(2, "Chart", Map::new()),
                AIChunk::text(3, "world"),
            ],
            streaming_complete: false,
        };
        assert_eq!(state.text(), "Hello, world");
    }
}
