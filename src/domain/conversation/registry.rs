//! ConversationRegistry - conversation list, active id, and snapshot cache.
//!
//! The snapshot cache is keyed by conversation id but stored apart from the
//! list, so removing or closing a conversation leaves its history retrievable.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::foundation::sync::{read, write};
use crate::domain::foundation::{ConversationId, MessageId};
use crate::domain::message::{MessagePayload, StoredMessage};

use super::{Conversation, ConversationPatch};

#[derive(Debug, Default)]
struct RegistryState {
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
    snapshots: HashMap<ConversationId, Vec<StoredMessage>>,
}

/// Registry of conversations known to one conversation engine.
#[derive(Debug, Default)]
pub struct ConversationRegistry {
    state: RwLock<RegistryState>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the list outright. Later entries repeating an id are dropped.
    pub fn set_all(&self, conversations: Vec<Conversation>) {
        let mut unique: Vec<Conversation> = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            if unique.iter().all(|c| c.id != conversation.id) {
                unique.push(conversation);
            }
        }
        write(&self.state).conversations = unique;
    }

    /// Appends a conversation. Returns false (and changes nothing) if the id
    /// is already registered.
    pub fn add(&self, conversation: Conversation) -> bool {
        let mut state = write(&self.state);
        if state.conversations.iter().any(|c| c.id == conversation.id) {
            return false;
        }
        state.conversations.push(conversation);
        true
    }

    /// Merges `patch` into the conversation with `id`. No-op if absent.
    pub fn update(&self, id: &ConversationId, patch: ConversationPatch) -> bool {
        let mut state = write(&self.state);
        match state.conversations.iter_mut().find(|c| &c.id == id) {
            Some(conversation) => {
                patch.apply(conversation);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, id: &ConversationId) -> bool {
        let mut state = write(&self.state);
        let before = state.conversations.len();
        state.conversations.retain(|c| &c.id != id);
        state.conversations.len() != before
    }

    pub fn set_active(&self, id: Option<ConversationId>) {
        write(&self.state).active = id;
    }

    pub fn active_id(&self) -> Option<ConversationId> {
        read(&self.state).active.clone()
    }

    pub fn active(&self) -> Option<Conversation> {
        let state = read(&self.state);
        let active = state.active.as_ref()?;
        state.conversations.iter().find(|c| &c.id == active).cloned()
    }

    /// Stores a copy of `snapshot` under `id`, overwriting any earlier one.
    pub fn cache_messages(&self, id: &ConversationId, snapshot: &[StoredMessage]) {
        write(&self.state)
            .snapshots
            .insert(id.clone(), snapshot.to_vec());
    }

    /// Returns the cached snapshot for `id`, or an empty list.
    pub fn cached_messages(&self, id: &ConversationId) -> Vec<StoredMessage> {
        read(&self.state)
            .snapshots
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Replaces the data of message `message_id` in every cached snapshot
    /// holding it. Returns how many snapshots changed.
    pub fn update_cached_message(&self, message_id: &MessageId, data: &MessagePayload) -> usize {
        let mut state = write(&self.state);
        let mut changed = 0;
        for snapshot in state.snapshots.values_mut() {
            if let Some(message) = snapshot.iter_mut().find(|m| &m.id == message_id) {
                message.data = data.clone();
                changed += 1;
            }
        }
        changed
    }

    pub fn get(&self, id: &ConversationId) -> Option<Conversation> {
        read(&self.state)
            .conversations
            .iter()
            .find(|c| &c.id == id)
            .cloned()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        read(&self.state).conversations.clone()
    }

    pub fn len(&self) -> usize {
        read(&self.state).conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.state).conversations.is_empty()
    }

    /// Empties the conversation list. The snapshot cache is kept.
    pub fn clear(&self) {
        write(&self.state).conversations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::ConversationStatus;
    use crate::domain::message::IncomingMessage;

    fn id(s: &str) -> ConversationId {
        ConversationId::new(s)
    }

    #[test]
    fn add_rejects_duplicate_ids() {
        let registry = ConversationRegistry::new();
        assert!(registry.add(Conversation::new("c1", "One")));
        assert!(!registry.add(Conversation::new("c1", "Again")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&id("c1")).unwrap().title, "One");
    }

    #[test]
    fn set_all_replaces_and_dedupes() {
        let registry = ConversationRegistry::new();
        registry.add(Conversation::new("old", "Old"));

        registry.set_all(vec![
            Conversation::new("a", "A"),
            Conversation::new("b", "B"),
            Conversation::new("a", "A2"),
        ]);

        let ids: Vec<_> = registry.conversations().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![id("a"), id("b")]);
    }

    #[test]
    fn update_unknown_id_is_noop() {
        let registry = ConversationRegistry::new();
        assert!(!registry.update(&id("nope"), ConversationPatch::unread_count(1)));
    }

    #[test]
    fn update_merges_patch() {
        let registry = ConversationRegistry::new();
        registry.add(Conversation::new("c1", "One"));
        registry.update(&id("c1"), ConversationPatch::status(ConversationStatus::Closed));
        assert!(registry.get(&id("c1")).unwrap().status.is_closed());
    }

    #[test]
    fn active_resolves_to_registered_conversation() {
        let registry = ConversationRegistry::new();
        registry.add(Conversation::new("c1", "One"));
        registry.set_active(Some(id("c1")));
        assert_eq!(registry.active().unwrap().title, "One");

        registry.set_active(None);
        assert!(registry.active().is_none());
    }

    #[test]
    fn cache_overwrites_and_survives_removal() {
        let registry = ConversationRegistry::new();
        registry.add(Conversation::new("c1", "One"));
        let first = vec![StoredMessage::from_incoming(IncomingMessage::text("m1", "a"))];
        let second = vec![StoredMessage::from_incoming(IncomingMessage::text("m2", "b"))];

        registry.cache_messages(&id("c1"), &first);
        registry.cache_messages(&id("c1"), &second);
        registry.remove(&id("c1"));

        assert_eq!(registry.cached_messages(&id("c1")), second);
    }

    #[test]
    fn missing_cache_entry_is_empty() {
        let registry = ConversationRegistry::new();
        assert!(registry.cached_messages(&id("ghost")).is_empty());
    }

    #[test]
    fn update_cached_message_patches_only_holding_snapshots() {
        let registry = ConversationRegistry::new();
        let held = vec![StoredMessage::from_incoming(IncomingMessage::text("m1", "a"))];
        let other = vec![StoredMessage::from_incoming(IncomingMessage::text("m2", "b"))];
        registry.cache_messages(&id("c1"), &held);
        registry.cache_messages(&id("c2"), &other);

        let mut data = MessagePayload::new();
        data.insert("text".into(), serde_json::json!("updated"));
        assert_eq!(registry.update_cached_message(&MessageId::new("m1"), &data), 1);
        assert_eq!(registry.update_cached_message(&MessageId::new("ghost"), &data), 0);

        assert_eq!(registry.cached_messages(&id("c1"))[0].data, data);
        assert_eq!(registry.cached_messages(&id("c2")), other);
    }
}
