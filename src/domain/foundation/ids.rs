//! Strongly-typed identifier value objects.
//!
//! Identifiers in a chat widget come from many places (transport adapters,
//! callers, the engine itself), so they are opaque strings rather than UUIDs.
//! Engine-generated ids use UUID v4 text.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

use super::ValidationError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from any string. Does not validate.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Creates an identifier, rejecting empty or whitespace-only values.
            pub fn try_new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(ValidationError::empty_field($field));
                }
                Ok(Self(value))
            }

            /// Creates a random identifier.
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a chat message, unique within one message log.
    MessageId,
    "message_id"
);

string_id!(
    /// Identifier of a logical conversation.
    ConversationId,
    "conversation_id"
);

string_id!(
    /// Opaque identifier grouping every chunk of one streamed bot turn.
    StreamId,
    "stream_id"
);
