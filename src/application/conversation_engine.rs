//! ConversationEngine - many logical conversations over one engine.
//!
//! Wraps a single `Engine` (sharing it, so transport callbacks are registered
//! once) and swaps the message log in and out of the `ConversationRegistry`
//! snapshot cache as the active conversation changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::domain::conversation::{
    Conversation, ConversationPatch, ConversationRegistry, ConversationStatus,
};
use crate::domain::foundation::{ConversationId, MessageId};
use crate::domain::message::MessagePayload;

use super::engine::{Engine, EngineError};

/// Multi-conversation wrapper around an `Engine`.
#[derive(Clone)]
pub struct ConversationEngine {
    engine: Engine,
    registry: Arc<ConversationRegistry>,
    callbacks_registered: Arc<AtomicBool>,
}

impl ConversationEngine {
    pub fn new(engine: Engine) -> Self {
        Self::with_registry(engine, Arc::new(ConversationRegistry::new()))
    }

    pub fn with_registry(engine: Engine, registry: Arc<ConversationRegistry>) -> Self {
        Self {
            engine,
            registry,
            callbacks_registered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn registry(&self) -> &Arc<ConversationRegistry> {
        &self.registry
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.registry.conversations()
    }

    pub fn active(&self) -> Option<Conversation> {
        self.registry.active()
    }

    /// Initializes the engine, loads the conversation list when the
    /// transport can list, and activates the best candidate: the first open
    /// conversation, else the first pending one, else the first listed.
    ///
    /// # Errors
    ///
    /// Propagates engine init failures and `list_conversations` failures.
    pub async fn init(&self) -> Result<(), EngineError> {
        let transport = self.engine.transport();
        let capabilities = transport.capabilities();

        self.register_callbacks();
        self.engine.init().await?;

        if !capabilities.list_conversations {
            return Ok(());
        }

        let conversations = transport.list_conversations().await?;
        tracing::debug!(count = conversations.len(), "Conversations loaded");
        self.registry.set_all(conversations);

        if let Some(id) = initial_conversation(&self.registry.conversations()) {
            self.switch_to(&id).await?;
        }
        Ok(())
    }

    /// Registers the conversation-update and detached-stream callbacks once,
    /// so a retried `init` does not register them twice.
    fn register_callbacks(&self) {
        if self.callbacks_registered.swap(true, Ordering::SeqCst) {
            return;
        }

        let transport = self.engine.transport();
        if transport.capabilities().conversation_updates {
            let registry = Arc::clone(&self.registry);
            transport.on_conversation_update(Arc::new(move |id: ConversationId, patch: ConversationPatch| {
                if !registry.update(&id, patch) {
                    tracing::debug!(conversation_id = %id, "Update for unknown conversation");
                }
            }));
        }

        // Streams keep growing in the snapshot of the conversation they started in.
        let registry = Arc::clone(&self.registry);
        self.engine
            .on_detached_stream(Arc::new(move |message_id: &MessageId, data: &MessagePayload| {
                if registry.update_cached_message(message_id, data) == 0 {
                    tracing::debug!(message_id = %message_id, "Stream message not in any snapshot");
                }
            }));
    }

    /// Makes `id` the active conversation.
    ///
    /// The current log is cached under the previously active id, the target's
    /// cached snapshot (or nothing) replaces it, and the target's unread
    /// counter is zeroed. Switching to the active conversation does nothing.
    pub async fn switch_to(&self, id: &ConversationId) -> Result<(), EngineError> {
        if self.engine.is_destroyed() {
            return Err(EngineError::Destroyed);
        }
        let current = self.registry.active_id();
        if current.as_ref() == Some(id) {
            return Ok(());
        }

        if let Some(current) = &current {
            self.registry.cache_messages(current, &self.engine.messages());
        }

        let transport = self.engine.transport();
        if transport.capabilities().switch_conversation {
            if let Err(error) = transport.switch_conversation(id).await {
                tracing::warn!(conversation_id = %id, error = %error, "Transport switch failed");
            }
        }

        self.engine.restore_messages(self.registry.cached_messages(id));
        self.registry.set_active(Some(id.clone()));
        self.registry.update(id, ConversationPatch::unread_count(0));
        tracing::debug!(conversation_id = %id, "Switched conversation");
        Ok(())
    }

    /// Creates a conversation through the transport and switches to it.
    ///
    /// Returns `Ok(None)` when the transport cannot create conversations.
    pub async fn create_new(
        &self,
        title: Option<&str>,
        metadata: Option<MessagePayload>,
    ) -> Result<Option<Conversation>, EngineError> {
        let transport = self.engine.transport();
        if !transport.capabilities().create_conversation {
            return Ok(None);
        }

        let conversation = transport
            .create_conversation(title, metadata.as_ref())
            .await?;
        self.registry.add(conversation.clone());
        self.switch_to(&conversation.id).await?;
        Ok(Some(conversation))
    }

    /// Closes a conversation. If it was active, the first remaining
    /// non-closed conversation becomes active, or none.
    pub async fn close(&self, id: &ConversationId) -> Result<(), EngineError> {
        let transport = self.engine.transport();
        if !transport.capabilities().close_conversation {
            return Ok(());
        }

        transport.close_conversation(id).await?;
        self.registry
            .update(id, ConversationPatch::status(ConversationStatus::Closed));

        if self.registry.active_id().as_ref() != Some(id) {
            return Ok(());
        }

        let next = self
            .registry
            .conversations()
            .into_iter()
            .find(|conversation| !conversation.status.is_closed());
        match next {
            Some(next) => self.switch_to(&next.id).await,
            None => {
                self.registry.cache_messages(id, &self.engine.messages());
                self.registry.set_active(None);
                Ok(())
            }
        }
    }

    /// Destroys the wrapped engine and forgets every conversation.
    pub async fn destroy(&self) {
        self.engine.destroy().await;
        self.registry.clear();
        self.registry.set_active(None);
    }
}

fn initial_conversation(conversations: &[Conversation]) -> Option<ConversationId> {
    let with_status =
        move |status: ConversationStatus| conversations.iter().find(|c| c.status == status);

    with_status(ConversationStatus::Open)
        .or_else(|| with_status(ConversationStatus::Pending))
        .or_else(|| conversations.first())
        .map(|conversation| conversation.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(id: &str, status: ConversationStatus) -> Conversation {
        Conversation::new(id, id.to_uppercase()).with_status(status)
    }

    #[test]
    fn initial_prefers_open_then_pending_then_first() {
        let list = vec![
            conversation("a", ConversationStatus::Resolved),
            conversation("b", ConversationStatus::Pending),
            conversation("c", ConversationStatus::Open),
        ];
        assert_eq!(initial_conversation(&list), Some(ConversationId::new("c")));

        let list = vec![
            conversation("a", ConversationStatus::Closed),
            conversation("b", ConversationStatus::Pending),
        ];
        assert_eq!(initial_conversation(&list), Some(ConversationId::new("b")));

        let list = vec![conversation("a", ConversationStatus::Closed)];
        assert_eq!(initial_conversation(&list), Some(ConversationId::new("a")));

        assert_eq!(initial_conversation(&[]), None);
    }
}
