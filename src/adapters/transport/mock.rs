//! Mock transport for testing and demos.
//!
//! Implements every part of the `ChatTransport` port in memory, so the engine
//! can be exercised without a backend.
//!
//! # Features
//!
//! - Configurable capabilities and `add_sent_to_history`
//! - Scripted connect results and history pages
//! - Error injection for sends
//! - Call tracking for verification
//! - `emit_*` helpers that invoke the callbacks the engine registered
//!
//! # Example
//!
//! ```ignore
//! let transport = Arc::new(MockTransport::new().with_capabilities(TransportCapabilities::all()));
//! let engine = Engine::builder(transport.clone()).build();
//! engine.init().await?;
//!
//! transport.emit_message(IncomingMessage::text("b1", "Hello!"));
//! assert_eq!(engine.messages().len(), 1);
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::conversation::{Conversation, ConversationPatch};
use crate::domain::foundation::sync::lock;
use crate::domain::foundation::{ConversationId, MessageId, StreamId};
use crate::domain::genui::AIChunk;
use crate::domain::message::{DeliveryStatus, IncomingMessage, MessagePayload, OutgoingMessage};
use crate::ports::{
    Attachment, ChatTransport, ChunkHandler, ConnectHandler, ConversationUpdateHandler,
    DisconnectHandler, DisconnectReason, Feedback, HistoryPage, MessageHandler,
    MessageStatusHandler, TransportCapabilities, TransportError, TypingHandler,
};

/// Everything the mock has been asked to do.
#[derive(Debug, Clone, Default)]
pub struct MockCalls {
    pub connect: usize,
    pub disconnect: usize,
    pub sent: Vec<OutgoingMessage>,
    pub feedback: Vec<(MessageId, Feedback)>,
    pub files: Vec<String>,
    pub history_cursors: Vec<Option<String>>,
    pub component_events: Vec<(StreamId, String, Value)>,
    pub list_conversations: usize,
    pub created: Vec<Option<String>>,
    pub switched: Vec<ConversationId>,
    pub closed: Vec<ConversationId>,
    pub conversation_update_handlers: usize,
}

#[derive(Default)]
struct Handlers {
    message: Option<MessageHandler>,
    disconnect: Option<DisconnectHandler>,
    connect: Option<ConnectHandler>,
    typing: Option<TypingHandler>,
    status: Option<MessageStatusHandler>,
    chunk: Option<ChunkHandler>,
    conversation_update: Option<ConversationUpdateHandler>,
}

/// In-memory `ChatTransport`.
pub struct MockTransport {
    capabilities: TransportCapabilities,
    add_sent_to_history: bool,
    history_delay: Duration,
    connect_results: Mutex<VecDeque<Result<(), TransportError>>>,
    send_error: Mutex<Option<TransportError>>,
    history_pages: Mutex<VecDeque<HistoryPage>>,
    conversations: Mutex<Vec<Conversation>>,
    calls: Mutex<MockCalls>,
    handlers: Mutex<Handlers>,
    next_conversation: AtomicU64,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a mock with no optional capabilities whose connects succeed.
    pub fn new() -> Self {
        Self {
            capabilities: TransportCapabilities::none(),
            add_sent_to_history: true,
            history_delay: Duration::ZERO,
            connect_results: Mutex::new(VecDeque::new()),
            send_error: Mutex::new(None),
            history_pages: Mutex::new(VecDeque::new()),
            conversations: Mutex::new(Vec::new()),
            calls: Mutex::new(MockCalls::default()),
            handlers: Mutex::new(Handlers::default()),
            next_conversation: AtomicU64::new(1),
        }
    }

    pub fn with_capabilities(mut self, capabilities: TransportCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Stops the engine from echoing sends into its log.
    pub fn without_sent_history(mut self) -> Self {
        self.add_sent_to_history = false;
        self
    }

    /// Makes every `load_history` call take `delay`.
    pub fn with_history_delay(mut self, delay: Duration) -> Self {
        self.history_delay = delay;
        self
    }

    /// Conversations returned by `list_conversations`.
    pub fn with_conversations(self, conversations: Vec<Conversation>) -> Self {
        *lock(&self.conversations) = conversations;
        self
    }

    /// Queues a page for `load_history`. Once the queue is empty, calls
    /// return an empty page with `has_more = false`.
    pub fn with_history_page(self, page: HistoryPage) -> Self {
        lock(&self.history_pages).push_back(page);
        self
    }

    /// Queues the result of the next `connect` call. Unscripted connects succeed.
    pub fn script_connect(&self, result: Result<(), TransportError>) {
        lock(&self.connect_results).push_back(result);
    }

    /// Makes the next `n` connects fail.
    pub fn fail_connects(&self, n: usize) {
        for attempt in 1..=n {
            self.script_connect(Err(TransportError::connection_failed(format!(
                "scripted failure {attempt}"
            ))));
        }
    }

    /// Makes every subsequent `send_message` fail with `error` (`None` to stop).
    pub fn fail_sends(&self, error: Option<TransportError>) {
        *lock(&self.send_error) = error;
    }

    pub fn calls(&self) -> MockCalls {
        lock(&self.calls).clone()
    }

    pub fn connect_count(&self) -> usize {
        lock(&self.calls).connect
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        lock(&self.calls).sent.clone()
    }

    // === Backend simulation ===

    pub fn emit_message(&self, message: IncomingMessage) -> bool {
        let handler = lock(&self.handlers).message.clone();
        handler.map(|h| h(message)).is_some()
    }

    pub fn emit_disconnect(&self, reason: DisconnectReason) -> bool {
        let handler = lock(&self.handlers).disconnect.clone();
        handler.map(|h| h(reason)).is_some()
    }

    pub fn emit_connect(&self) -> bool {
        let handler = lock(&self.handlers).connect.clone();
        handler.map(|h| h()).is_some()
    }

    pub fn emit_typing(&self, typing: bool) -> bool {
        let handler = lock(&self.handlers).typing.clone();
        handler.map(|h| h(typing)).is_some()
    }

    pub fn emit_status(&self, id: impl Into<MessageId>, status: DeliveryStatus) -> bool {
        let handler = lock(&self.handlers).status.clone();
        handler.map(|h| h(id.into(), status)).is_some()
    }

    pub fn emit_chunk(&self, stream_id: impl Into<StreamId>, chunk: AIChunk, done: bool) -> bool {
        let handler = lock(&self.handlers).chunk.clone();
        handler.map(|h| h(stream_id.into(), chunk, done)).is_some()
    }

    pub fn emit_conversation_update(&self, id: impl Into<ConversationId>, patch: ConversationPatch) -> bool {
        let handler = lock(&self.handlers).conversation_update.clone();
        handler.map(|h| h(id.into(), patch)).is_some()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        lock(&self.calls).connect += 1;
        lock(&self.connect_results).pop_front().unwrap_or(Ok(()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        lock(&self.calls).disconnect += 1;
        self.emit_disconnect(DisconnectReason::User);
        Ok(())
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), TransportError> {
        lock(&self.calls).sent.push(message.clone());
        match lock(&self.send_error).clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn on_message(&self, handler: MessageHandler) {
        lock(&self.handlers).message = Some(handler);
    }

    fn on_disconnect(&self, handler: DisconnectHandler) {
        lock(&self.handlers).disconnect = Some(handler);
    }

    fn on_connect(&self, handler: ConnectHandler) {
        lock(&self.handlers).connect = Some(handler);
    }

    fn on_typing(&self, handler: TypingHandler) {
        lock(&self.handlers).typing = Some(handler);
    }

    fn on_message_status(&self, handler: MessageStatusHandler) {
        lock(&self.handlers).status = Some(handler);
    }

    fn on_genui_chunk(&self, handler: ChunkHandler) {
        lock(&self.handlers).chunk = Some(handler);
    }

    fn on_conversation_update(&self, handler: ConversationUpdateHandler) {
        lock(&self.calls).conversation_update_handlers += 1;
        lock(&self.handlers).conversation_update = Some(handler);
    }

    fn capabilities(&self) -> TransportCapabilities {
        self.capabilities
    }

    fn add_sent_to_history(&self) -> bool {
        self.add_sent_to_history
    }

    async fn send_feedback(&self, message_id: &MessageId, feedback: Feedback) -> Result<(), TransportError> {
        lock(&self.calls).feedback.push((message_id.clone(), feedback));
        Ok(())
    }

    async fn send_file(
        &self,
        file: &Attachment,
        _metadata: Option<&MessagePayload>,
    ) -> Result<(), TransportError> {
        lock(&self.calls).files.push(file.name.clone());
        Ok(())
    }

    async fn load_history(&self, cursor: Option<&str>) -> Result<HistoryPage, TransportError> {
        lock(&self.calls)
            .history_cursors
            .push(cursor.map(str::to_string));
        if !self.history_delay.is_zero() {
            tokio::time::sleep(self.history_delay).await;
        }
        Ok(lock(&self.history_pages).pop_front().unwrap_or_default())
    }

    async fn receive_component_event(
        &self,
        stream_id: &StreamId,
        event_type: &str,
        payload: &Value,
    ) -> Result<(), TransportError> {
        lock(&self.calls).component_events.push((
            stream_id.clone(),
            event_type.to_string(),
            payload.clone(),
        ));
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, TransportError> {
        lock(&self.calls).list_conversations += 1;
        Ok(lock(&self.conversations).clone())
    }

    async fn create_conversation(
        &self,
        title: Option<&str>,
        metadata: Option<&MessagePayload>,
    ) -> Result<Conversation, TransportError> {
        lock(&self.calls).created.push(title.map(str::to_string));
        let n = self.next_conversation.fetch_add(1, Ordering::SeqCst);
        let mut conversation = Conversation::new(
            format!("mock-conv-{n}"),
            title.unwrap_or("New conversation"),
        );
        conversation.metadata = metadata.cloned();
        lock(&self.conversations).push(conversation.clone());
        Ok(conversation)
    }

    async fn switch_conversation(&self, id: &ConversationId) -> Result<(), TransportError> {
        lock(&self.calls).switched.push(id.clone());
        Ok(())
    }

    async fn close_conversation(&self, id: &ConversationId) -> Result<(), TransportError> {
        lock(&self.calls).closed.push(id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_connect_results_are_consumed_in_order() {
        let transport = MockTransport::new();
        transport.fail_connects(1);

        assert!(transport.connect().await.is_err());
        assert!(transport.connect().await.is_ok());
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn send_failures_can_be_injected() {
        let transport = MockTransport::new();
        transport.fail_sends(Some(TransportError::send_failed("offline")));

        let result = transport.send_message(&OutgoingMessage::text("hi")).await;

        assert_eq!(result, Err(TransportError::send_failed("offline")));
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn emit_without_handler_reports_false() {
        let transport = MockTransport::new();
        assert!(!transport.emit_typing(true));
    }

    #[tokio::test]
    async fn history_defaults_to_exhausted_page() {
        let transport = MockTransport::new();
        let page = transport.load_history(Some("c1")).await.unwrap();

        assert!(page.messages.is_empty());
        assert!(!page.has_more);
        assert_eq!(transport.calls().history_cursors, vec![Some("c1".to_string())]);
    }

    #[tokio::test]
    async fn created_conversations_get_fresh_ids() {
        let transport = MockTransport::new();
        let a = transport.create_conversation(Some("A"), None).await.unwrap();
        let b = transport.create_conversation(None, None).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(b.title, "New conversation");
        assert_eq!(transport.list_conversations().await.unwrap().len(), 2);
    }
}
