//! MessageLog - ordered, deduplicating, versioned message list.
//!
//! The log remembers every id it has ever held (until `clear` or `restore`),
//! so a message removed with `remove_by_id` cannot come back through `add`.
//!
//! `version` counts structural and in-place changes (`restore`, `clear`,
//! `update_by_id`). Plain appends do not bump it, which lets subscribers tell
//! "a new message arrived" apart from "an existing message changed".

use std::collections::HashSet;
use std::sync::RwLock;

use crate::domain::foundation::sync::{read, write};
use crate::domain::foundation::MessageId;

use super::{MessagePatch, StoredMessage};

#[derive(Debug, Default)]
struct LogState {
    messages: Vec<StoredMessage>,
    seen: HashSet<MessageId>,
    version: u64,
}

/// Ordered message list with id-based deduplication.
#[derive(Debug, Default)]
pub struct MessageLog {
    state: RwLock<LogState>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` unless its id has been seen. Returns whether it was added.
    pub fn add(&self, message: StoredMessage) -> bool {
        let mut state = write(&self.state);
        if !state.seen.insert(message.id.clone()) {
            tracing::trace!(message_id = %message.id, "Duplicate message ignored");
            return false;
        }
        state.messages.push(message);
        true
    }

    /// Inserts unseen messages before the current head, keeping their order.
    ///
    /// Returns how many were inserted.
    pub fn prepend(&self, messages: Vec<StoredMessage>) -> usize {
        let mut state = write(&self.state);
        let mut fresh = Vec::with_capacity(messages.len());
        for message in messages {
            if state.seen.insert(message.id.clone()) {
                fresh.push(message);
            }
        }
        let inserted = fresh.len();
        if inserted > 0 {
            fresh.append(&mut state.messages);
            state.messages = fresh;
        }
        inserted
    }

    /// Merges `patch` into the message with `id`. No-op if absent.
    pub fn update_by_id(&self, id: &MessageId, patch: MessagePatch) -> bool {
        self.modify_by_id(id, |message| patch.apply(message))
    }

    /// In-place edit under the log lock. Bumps `version` when the id exists.
    pub(crate) fn modify_by_id(&self, id: &MessageId, edit: impl FnOnce(&mut StoredMessage)) -> bool {
        let mut state = write(&self.state);
        let Some(message) = state.messages.iter_mut().find(|m| &m.id == id) else {
            return false;
        };
        edit(message);
        state.version += 1;
        true
    }

    /// Deletes the message with `id`. Its id stays in the seen set.
    pub fn remove_by_id(&self, id: &MessageId) -> bool {
        let mut state = write(&self.state);
        let before = state.messages.len();
        state.messages.retain(|m| &m.id != id);
        state.messages.len() != before
    }

    /// Replaces the whole list and the seen set with exactly `messages`.
    ///
    /// Repeated ids within `messages` keep their first occurrence.
    pub fn restore(&self, messages: Vec<StoredMessage>) {
        let mut state = write(&self.state);
        let mut seen = HashSet::with_capacity(messages.len());
        let mut kept = Vec::with_capacity(messages.len());
        for message in messages {
            if seen.insert(message.id.clone()) {
                kept.push(message);
            }
        }
        state.messages = kept;
        state.seen = seen;
        state.version += 1;
    }

    /// Empties the list and forgets every seen id.
    pub fn clear(&self) {
        let mut state = write(&self.state);
        state.messages.clear();
        state.seen.clear();
        state.version += 1;
    }

    /// Snapshot of the current list.
    pub fn messages(&self) -> Vec<StoredMessage> {
        read(&self.state).messages.clone()
    }

    pub fn get(&self, id: &MessageId) -> Option<StoredMessage> {
        read(&self.state).messages.iter().find(|m| &m.id == id).cloned()
    }

    /// Returns true if a message with `id` is currently in the list.
    pub fn contains(&self, id: &MessageId) -> bool {
        read(&self.state).messages.iter().any(|m| &m.id == id)
    }

    pub fn len(&self) -> usize {
        read(&self.state).messages.len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.state).messages.is_empty()
    }

    pub fn version(&self) -> u64 {
        read(&self.state).version
    }
}
