//! Engine - drives one chat transport.
//!
//! Owns the connection state machine and reconnect backoff, and wires the
//! message log, extension pipeline, command registry and stream assembler to
//! the transport's callbacks.
//!
//! # Concurrency
//!
//! All engine state sits behind one mutex that is never held across an await
//! or while user code (hooks, transformers, event handlers) runs. Transport
//! callbacks hold a `Weak` reference, so dropping every `Engine` handle lets
//! the state go even if the transport outlives it.
//!
//! The engine spawns tokio tasks for reconnect attempts and for forwarding UI
//! component events, so it must be used inside a tokio runtime.

use serde_json::Value;
use std::sync::{Arc, Mutex, Weak};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::adapters::InMemoryWidgetEventBus;
use crate::config::{AppConfig, ReconnectConfig, WidgetConfig};
use crate::domain::command::CommandRegistry;
use crate::domain::foundation::sync::lock;
use crate::domain::foundation::{ConnectionStatus, MessageId, StateMachine, StreamId};
use crate::domain::genui::{AIChunk, ComponentEvent, EventForwarder, ScopedEventBus, StreamAssembler};
use crate::domain::message::{
    DeliveryStatus, IncomingMessage, MessageLog, MessagePatch, MessagePayload, OutgoingMessage,
    Sender, StoredMessage,
};
use crate::ports::{
    Attachment, ChatTransport, DisconnectReason, Feedback, TransportError, WidgetEvent,
    WidgetEventBus,
};

use super::pipeline::ExtensionPipeline;

/// Errors returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Engine has been destroyed")]
    Destroyed,
}

/// Result of `Engine::submit_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The text named a registered command, which ran instead of a send.
    Command(String),
    /// The text was sent as a message with this id.
    Sent(MessageId),
    /// An extension dropped the message before it reached the transport.
    Dropped,
}

/// Receives the latest payload of a GenUI message that is not in the log,
/// e.g. one cached away by a conversation switch while still streaming.
pub type DetachedStreamHandler = Arc<dyn Fn(&MessageId, &MessagePayload) + Send + Sync>;

#[derive(Debug, Default)]
struct HistoryState {
    in_flight: bool,
    exhausted: bool,
    cursor: Option<String>,
    /// Bumped whenever the log is replaced; pages for an older log are dropped.
    generation: u64,
}

impl HistoryState {
    fn reset(&mut self) {
        self.in_flight = false;
        self.exhausted = false;
        self.cursor = None;
        self.generation += 1;
    }
}

struct EngineState {
    status: ConnectionStatus,
    destroyed: bool,
    callbacks_registered: bool,
    is_open: bool,
    unread: u32,
    typing: bool,
    reconnect_attempts: u32,
    reconnect_task: Option<JoinHandle<()>>,
    history: HistoryState,
    search_query: String,
    detached_stream: Option<DetachedStreamHandler>,
}

/// Clears the history in-flight flag even if the load future is dropped,
/// unless the log was replaced in the meantime.
struct HistoryGuard<'a> {
    state: &'a Mutex<EngineState>,
    generation: u64,
}

impl Drop for HistoryGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        if state.history.generation == self.generation {
            state.history.in_flight = false;
        }
    }
}

struct EngineInner {
    transport: Arc<dyn ChatTransport>,
    log: Arc<MessageLog>,
    pipeline: Arc<ExtensionPipeline>,
    commands: Arc<CommandRegistry>,
    events: Arc<dyn WidgetEventBus>,
    assembler: StreamAssembler,
    reconnect: ReconnectConfig,
    command_prefix: String,
    state: Mutex<EngineState>,
}

/// Builder for `Engine`.
pub struct EngineBuilder {
    transport: Arc<dyn ChatTransport>,
    reconnect: ReconnectConfig,
    widget: WidgetConfig,
    log: Option<Arc<MessageLog>>,
    pipeline: Option<Arc<ExtensionPipeline>>,
    commands: Option<Arc<CommandRegistry>>,
    events: Option<Arc<dyn WidgetEventBus>>,
}

impl EngineBuilder {
    /// Applies the reconnect and widget sections of `config`.
    pub fn config(mut self, config: &AppConfig) -> Self {
        self.reconnect = config.reconnect.clone();
        self.widget = config.widget.clone();
        self
    }

    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn widget(mut self, widget: WidgetConfig) -> Self {
        self.widget = widget;
        self
    }

    pub fn message_log(mut self, log: Arc<MessageLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Uses an existing pipeline. Extension commands land wherever that
    /// pipeline was told to put them.
    pub fn pipeline(mut self, pipeline: Arc<ExtensionPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn commands(mut self, commands: Arc<CommandRegistry>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn events(mut self, events: Arc<dyn WidgetEventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Engine {
        let commands = self.commands.unwrap_or_default();
        let pipeline = self
            .pipeline
            .unwrap_or_else(|| Arc::new(ExtensionPipeline::with_commands(Arc::clone(&commands))));
        let events: Arc<dyn WidgetEventBus> = match self.events {
            Some(events) => events,
            None if self.widget.record_events => Arc::new(InMemoryWidgetEventBus::recording()),
            None => Arc::new(InMemoryWidgetEventBus::new()),
        };
        let log = self.log.unwrap_or_default();
        let transport = self.transport;
        let reconnect = self.reconnect;
        let widget = self.widget;

        let inner = Arc::new_cyclic(|weak: &Weak<EngineInner>| EngineInner {
            transport,
            log,
            pipeline,
            commands,
            events,
            assembler: StreamAssembler::with_forwarder(component_event_forwarder(weak.clone())),
            reconnect,
            command_prefix: widget.command_prefix,
            state: Mutex::new(EngineState {
                status: ConnectionStatus::Idle,
                destroyed: false,
                callbacks_registered: false,
                is_open: widget.start_open,
                unread: 0,
                typing: false,
                reconnect_attempts: 0,
                reconnect_task: None,
                history: HistoryState::default(),
                search_query: String::new(),
                detached_stream: None,
            }),
        });

        Engine { inner }
    }
}

/// Message orchestration engine for one transport.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Creates an engine with default configuration.
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self::builder(transport).build()
    }

    pub fn builder(transport: Arc<dyn ChatTransport>) -> EngineBuilder {
        EngineBuilder {
            transport,
            reconnect: ReconnectConfig::default(),
            widget: WidgetConfig::default(),
            log: None,
            pipeline: None,
            commands: None,
            events: None,
        }
    }

    // === Lifecycle ===

    /// Registers transport callbacks (once) and connects.
    ///
    /// # Errors
    ///
    /// - `Destroyed` if `destroy` has been called
    /// - `Transport` if `connect` fails; status is then `error`
    pub async fn init(&self) -> Result<(), EngineError> {
        let inner = &self.inner;
        let pending = {
            let mut state = lock(&inner.state);
            if state.destroyed {
                return Err(EngineError::Destroyed);
            }
            state.reconnect_attempts = 0;
            state.reconnect_task.take()
        };
        if let Some(task) = pending {
            task.abort();
        }

        self.register_callbacks();
        inner.set_status(ConnectionStatus::Connecting);

        match inner.transport.connect().await {
            Ok(()) => {
                if inner.is_destroyed() {
                    return Err(EngineError::Destroyed);
                }
                inner.set_status(ConnectionStatus::Connected);
                tracing::info!("Transport connected");
                Ok(())
            }
            Err(error) => {
                if !inner.is_destroyed() {
                    inner.set_status(ConnectionStatus::Error);
                }
                tracing::warn!(error = %error, "Transport connect failed");
                Err(error.into())
            }
        }
    }

    /// Tears the engine down. Pending reconnects are cancelled and later
    /// transport callbacks are ignored. Further `init` calls fail.
    pub async fn destroy(&self) {
        let inner = &self.inner;
        let pending = {
            let mut state = lock(&inner.state);
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.reconnect_attempts = 0;
            state.typing = false;
            state.reconnect_task.take()
        };
        if let Some(task) = pending {
            task.abort();
        }

        if let Err(error) = inner.transport.disconnect().await {
            tracing::warn!(error = %error, "Transport disconnect failed during destroy");
        }
        inner.set_status(ConnectionStatus::Disconnected);
        tracing::info!("Engine destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }

    fn register_callbacks(&self) {
        let inner = &self.inner;
        {
            let mut state = lock(&inner.state);
            if state.callbacks_registered {
                return;
            }
            state.callbacks_registered = true;
        }

        let transport = &inner.transport;
        let weak = Arc::downgrade(inner);

        let w = weak.clone();
        transport.on_message(Arc::new(move |message: IncomingMessage| {
            if let Some(inner) = w.upgrade() {
                inner.handle_message(message);
            }
        }));

        let w = weak.clone();
        transport.on_disconnect(Arc::new(move |reason: DisconnectReason| {
            if let Some(inner) = w.upgrade() {
                inner.handle_disconnect(reason);
            }
        }));

        let w = weak.clone();
        transport.on_connect(Arc::new(move || {
            if let Some(inner) = w.upgrade() {
                inner.handle_connect();
            }
        }));

        let w = weak.clone();
        transport.on_typing(Arc::new(move |typing: bool| {
            if let Some(inner) = w.upgrade() {
                inner.handle_typing(typing);
            }
        }));

        let w = weak.clone();
        transport.on_message_status(Arc::new(move |id: MessageId, status: DeliveryStatus| {
            if let Some(inner) = w.upgrade() {
                inner.handle_status(&id, status);
            }
        }));

        transport.on_genui_chunk(Arc::new(move |stream_id: StreamId, chunk: AIChunk, done: bool| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_chunk(&stream_id, chunk, done);
            }
        }));
    }

    // === Sending ===

    /// Sends a message through the before-send pipeline.
    ///
    /// Returns `Ok(None)` if an extension dropped the message. When the
    /// transport echoes sends, the log entry goes `sending` -> `sent`, or
    /// `failed` if the transport rejects it.
    pub async fn send(&self, message: OutgoingMessage) -> Result<Option<MessageId>, EngineError> {
        let inner = &self.inner;
        if inner.is_destroyed() {
            return Err(EngineError::Destroyed);
        }

        let Some(message) = inner.pipeline.run_before_send(message) else {
            tracing::debug!("Outgoing message dropped by extension");
            return Ok(None);
        };

        let id = message.id.clone();
        let echo = inner.transport.add_sent_to_history();
        if echo {
            inner.log.add(StoredMessage::from_outgoing(message.clone()));
        }

        match inner.transport.send_message(&message).await {
            Ok(()) => {
                if echo && !inner.is_destroyed() {
                    // A status callback may already have moved it past `sent`.
                    inner.log.modify_by_id(&id, |stored| {
                        if stored.status == Some(DeliveryStatus::Sending) {
                            stored.status = Some(DeliveryStatus::Sent);
                        }
                    });
                }
                let mut sent = StoredMessage::from_outgoing(message);
                sent.status = Some(DeliveryStatus::Sent);
                inner.events.publish(WidgetEvent::MessageSent { message: sent });
                Ok(Some(id))
            }
            Err(error) => {
                if echo {
                    inner
                        .log
                        .update_by_id(&id, MessagePatch::status(DeliveryStatus::Failed));
                }
                tracing::warn!(message_id = %id, error = %error, "Send failed");
                Err(error.into())
            }
        }
    }

    /// Runs `text` as a slash command if it names one, otherwise sends it as
    /// a text message.
    pub async fn submit_text(&self, text: &str) -> Result<SubmitOutcome, EngineError> {
        if let Some(rest) = text.strip_prefix(self.inner.command_prefix.as_str()) {
            let (name, args) = rest
                .split_once(char::is_whitespace)
                .unwrap_or((rest, ""));
            if !name.is_empty() && self.inner.commands.execute(name, args) {
                tracing::debug!(command = name, "Command executed");
                return Ok(SubmitOutcome::Command(name.to_string()));
            }
        }

        match self.send(OutgoingMessage::text(text)).await? {
            Some(id) => Ok(SubmitOutcome::Sent(id)),
            None => Ok(SubmitOutcome::Dropped),
        }
    }

    /// Sends like/dislike feedback. A no-op for transports without feedback support.
    pub async fn send_feedback(&self, message_id: &MessageId, feedback: Feedback) -> Result<(), EngineError> {
        let inner = &self.inner;
        if !inner.transport.capabilities().feedback {
            tracing::debug!("Transport does not support feedback");
            return Ok(());
        }
        inner.transport.send_feedback(message_id, feedback).await?;
        Ok(())
    }

    /// Uploads a file. A no-op for transports without upload support.
    pub async fn send_file(
        &self,
        file: Attachment,
        metadata: Option<MessagePayload>,
    ) -> Result<(), EngineError> {
        let inner = &self.inner;
        if !inner.transport.capabilities().file_upload {
            tracing::debug!("Transport does not support file upload");
            return Ok(());
        }
        inner.transport.send_file(&file, metadata.as_ref()).await?;
        inner.events.publish(WidgetEvent::FileUploaded {
            name: file.name,
            content_type: file.content_type,
            size: file.data.len(),
            metadata,
        });
        Ok(())
    }

    // === History ===

    /// Loads the next page of older messages and prepends it to the log.
    ///
    /// Returns how many messages were added. Calls made while a load is in
    /// flight, after the transport reported no more history, or against a
    /// transport without history support return `Ok(0)`.
    pub async fn load_history(&self) -> Result<usize, EngineError> {
        let inner = &self.inner;
        if !inner.transport.capabilities().history {
            return Ok(0);
        }

        let (cursor, generation) = {
            let mut state = lock(&inner.state);
            if state.destroyed {
                return Err(EngineError::Destroyed);
            }
            if state.history.in_flight || state.history.exhausted {
                return Ok(0);
            }
            state.history.in_flight = true;
            (state.history.cursor.clone(), state.history.generation)
        };
        let guard = HistoryGuard {
            state: &inner.state,
            generation,
        };

        let page = inner.transport.load_history(cursor.as_deref()).await?;
        drop(guard);

        {
            let mut state = lock(&inner.state);
            if state.destroyed {
                return Ok(0);
            }
            if state.history.generation != generation {
                tracing::debug!("History page for a replaced log discarded");
                return Ok(0);
            }
            state.history.exhausted = !page.has_more;
            state.history.cursor = page.cursor;
        }

        let has_more = page.has_more;
        let count = inner.log.prepend(
            page.messages
                .into_iter()
                .map(StoredMessage::from_incoming)
                .collect(),
        );
        tracing::debug!(count, has_more, "History page loaded");
        inner.events.publish(WidgetEvent::HistoryLoaded { count, has_more });
        Ok(count)
    }

    pub fn has_more_history(&self) -> bool {
        !lock(&self.inner.state).history.exhausted
    }

    // === GenUI ===

    /// Forwards a UI component event for a GenUI message to the transport.
    ///
    /// Returns `false` without calling the transport when the message did
    /// not come from a stream or the transport cannot receive events.
    pub async fn receive_component_event(
        &self,
        message_id: &MessageId,
        event_type: &str,
        payload: Value,
    ) -> Result<bool, EngineError> {
        self.inner
            .receive_component_event(message_id, event_type, payload)
            .await
    }

    /// Event bus of a GenUI message, for UI components to listen and emit on.
    pub fn component_events(&self, message_id: &MessageId) -> Option<Arc<ScopedEventBus>> {
        self.inner.assembler.bus(&self.inner.log, message_id)
    }

    /// Number of streams with live event buses.
    pub fn active_streams(&self) -> usize {
        self.inner.assembler.active_streams()
    }

    // === Widget surface ===

    /// Opens the chat surface: clears unread, runs on-open hooks.
    pub fn open(&self) {
        let inner = &self.inner;
        {
            let mut state = lock(&inner.state);
            if state.is_open {
                return;
            }
            state.is_open = true;
            state.unread = 0;
        }
        inner.pipeline.notify_open();
        inner.events.publish(WidgetEvent::WidgetOpened);
    }

    /// Closes the chat surface and runs on-close hooks.
    pub fn close(&self) {
        let inner = &self.inner;
        {
            let mut state = lock(&inner.state);
            if !state.is_open {
                return;
            }
            state.is_open = false;
        }
        inner.pipeline.notify_close();
        inner.events.publish(WidgetEvent::WidgetClosed);
    }

    pub fn is_open(&self) -> bool {
        lock(&self.inner.state).is_open
    }

    pub fn unread_count(&self) -> u32 {
        lock(&self.inner.state).unread
    }

    pub fn is_typing(&self) -> bool {
        lock(&self.inner.state).typing
    }

    pub fn status(&self) -> ConnectionStatus {
        lock(&self.inner.state).status
    }

    pub fn reconnect_attempts(&self) -> u32 {
        lock(&self.inner.state).reconnect_attempts
    }

    // === Messages ===

    pub fn messages(&self) -> Vec<StoredMessage> {
        self.inner.log.messages()
    }

    pub fn message_log(&self) -> &Arc<MessageLog> {
        &self.inner.log
    }

    /// Replaces the log with `messages`.
    ///
    /// Restored stream messages catch up with chunks that arrived while they
    /// were away, completed streams whose messages are gone are torn down,
    /// and history paging starts over for the new log.
    pub fn restore_messages(&self, messages: Vec<StoredMessage>) {
        let inner = &self.inner;
        inner.log.restore(messages);
        inner.assembler.sync(&inner.log);
        inner.assembler.prune(&inner.log);
        lock(&inner.state).history.reset();
    }

    pub fn clear_messages(&self) {
        let inner = &self.inner;
        inner.log.clear();
        inner.assembler.prune(&inner.log);
        lock(&inner.state).history.reset();
    }

    /// Sets the handler for stream growth on GenUI messages that are not in
    /// the log. Replaces any earlier handler.
    pub fn on_detached_stream(&self, handler: DetachedStreamHandler) {
        lock(&self.inner.state).detached_stream = Some(handler);
    }

    // === Search ===

    pub fn set_search_query(&self, query: impl Into<String>) {
        let query = query.into();
        lock(&self.inner.state).search_query = query.clone();
        self.inner
            .events
            .publish(WidgetEvent::SearchQueryChanged { query });
    }

    pub fn search_query(&self) -> String {
        lock(&self.inner.state).search_query.clone()
    }

    /// Messages whose text contains the current query, ignoring case.
    pub fn search_results(&self) -> Vec<StoredMessage> {
        let query = self.search_query().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.inner
            .log
            .messages()
            .into_iter()
            .filter(|message| {
                message
                    .text()
                    .is_some_and(|text| text.to_lowercase().contains(&query))
            })
            .collect()
    }

    // === Collaborators ===

    pub fn transport(&self) -> &Arc<dyn ChatTransport> {
        &self.inner.transport
    }

    pub fn pipeline(&self) -> &Arc<ExtensionPipeline> {
        &self.inner.pipeline
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.inner.commands
    }

    pub fn events(&self) -> &Arc<dyn WidgetEventBus> {
        &self.inner.events
    }
}

impl EngineInner {
    fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }

    /// Moves to `next` if the transition is legal. Publishes on change.
    fn set_status(&self, next: ConnectionStatus) -> bool {
        {
            let mut state = lock(&self.state);
            if state.status == next {
                return false;
            }
            if let Err(error) = state.status.transition_to(next) {
                tracing::warn!(error = %error, "Ignoring connection status change");
                return false;
            }
            state.status = next;
        }
        tracing::debug!(status = %next, "Connection status changed");
        self.events
            .publish(WidgetEvent::ConnectorStatusChanged { status: next });
        true
    }

    fn handle_message(&self, message: IncomingMessage) {
        {
            let mut state = lock(&self.state);
            if state.destroyed {
                return;
            }
            state.typing = false;
        }

        let Some(message) = self.pipeline.run_after_receive(message) else {
            tracing::debug!("Incoming message dropped by extension");
            return;
        };

        let mut stored = StoredMessage::from_incoming(message);
        if stored.sender.is_none() {
            stored.sender = Some(Sender::Bot);
        }
        if !self.log.add(stored.clone()) {
            tracing::debug!(message_id = %stored.id, "Duplicate message ignored");
            return;
        }

        {
            let mut state = lock(&self.state);
            if !state.is_open {
                state.unread += 1;
            }
        }
        self.events
            .publish(WidgetEvent::MessageReceived { message: stored });
    }

    fn handle_typing(&self, typing: bool) {
        let mut state = lock(&self.state);
        if !state.destroyed {
            state.typing = typing;
        }
    }

    fn handle_status(&self, id: &MessageId, status: DeliveryStatus) {
        if self.is_destroyed() {
            return;
        }
        if !self.log.update_by_id(id, MessagePatch::status(status)) {
            tracing::debug!(message_id = %id, "Status update for unknown message");
        }
    }

    fn handle_chunk(&self, stream_id: &StreamId, chunk: AIChunk, done: bool) {
        if self.is_destroyed() {
            return;
        }
        let outcome = self.assembler.apply(&self.log, stream_id, chunk, done);
        if let Some(payload) = &outcome.detached {
            let handler = lock(&self.state).detached_stream.clone();
            if let Some(handler) = handler {
                handler(&outcome.message_id, payload);
            }
        }
        if outcome.started {
            self.events.publish(WidgetEvent::GenUiStreamStarted {
                stream_id: stream_id.clone(),
                message_id: outcome.message_id.clone(),
            });
        }
        if outcome.completed {
            self.events.publish(WidgetEvent::GenUiStreamCompleted {
                stream_id: stream_id.clone(),
                message_id: outcome.message_id,
            });
        }
    }

    /// The transport reconnected on its own.
    fn handle_connect(&self) {
        let pending = {
            let mut state = lock(&self.state);
            if state.destroyed {
                return;
            }
            state.reconnect_attempts = 0;
            state.reconnect_task.take()
        };
        if let Some(task) = pending {
            task.abort();
        }
        if matches!(
            self.status(),
            ConnectionStatus::Idle | ConnectionStatus::Error
        ) {
            self.set_status(ConnectionStatus::Connecting);
        }
        self.set_status(ConnectionStatus::Connected);
    }

    fn handle_disconnect(self: Arc<Self>, reason: DisconnectReason) {
        {
            let state = lock(&self.state);
            if state.destroyed {
                return;
            }
        }
        self.set_status(ConnectionStatus::Disconnected);

        if reason.is_user_initiated() {
            tracing::info!("Transport disconnected by user");
            return;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::error!("No tokio runtime available, cannot schedule reconnect");
                self.set_status(ConnectionStatus::Error);
                return;
            }
        };

        let mut state = lock(&self.state);
        if state.destroyed || state.reconnect_task.is_some() {
            return;
        }
        state.reconnect_attempts = 1;
        tracing::info!(reason = %reason, "Transport disconnected, scheduling reconnect");
        let weak = Arc::downgrade(&self);
        let reconnect = self.reconnect.clone();
        state.reconnect_task = Some(runtime.spawn(reconnect_loop(weak, reconnect)));
    }

    fn status(&self) -> ConnectionStatus {
        lock(&self.state).status
    }

    async fn receive_component_event(
        &self,
        message_id: &MessageId,
        event_type: &str,
        payload: Value,
    ) -> Result<bool, EngineError> {
        let Some(stream_id) = self.assembler.stream_for_message(message_id) else {
            return Ok(false);
        };
        if !self.transport.capabilities().component_events {
            tracing::debug!("Transport does not accept component events");
            return Ok(false);
        }
        self.transport
            .receive_component_event(&stream_id, event_type, &payload)
            .await?;
        Ok(true)
    }
}

/// Linear backoff: attempt n runs `n * base_delay` after the previous one.
async fn reconnect_loop(engine: Weak<EngineInner>, config: ReconnectConfig) {
    for attempt in 1..=config.max_attempts {
        let delay = config.delay_for(attempt);
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
        tokio::time::sleep(delay).await;

        let Some(inner) = engine.upgrade() else {
            return;
        };
        if inner.is_destroyed() {
            return;
        }

        let result = inner.transport.connect().await;
        let mut state = lock(&inner.state);
        if state.destroyed {
            return;
        }
        match result {
            Ok(()) => {
                state.reconnect_attempts = 0;
                state.reconnect_task = None;
                drop(state);
                tracing::info!(attempt, "Reconnected");
                inner.set_status(ConnectionStatus::Connected);
                return;
            }
            Err(error) => {
                tracing::warn!(attempt, error = %error, "Reconnect attempt failed");
                if attempt < config.max_attempts {
                    state.reconnect_attempts = attempt + 1;
                }
            }
        }
    }

    let Some(inner) = engine.upgrade() else {
        return;
    };
    {
        let mut state = lock(&inner.state);
        if state.destroyed {
            return;
        }
        state.reconnect_attempts = 0;
        state.reconnect_task = None;
    }
    tracing::warn!(attempts = config.max_attempts, "Reconnect attempts exhausted");
    inner.set_status(ConnectionStatus::Error);
}

/// Bubbles UI-originated component events to the transport in the background.
fn component_event_forwarder(engine: Weak<EngineInner>) -> EventForwarder {
    Arc::new(move |message_id: &MessageId, event: &ComponentEvent| {
        let Some(inner) = engine.upgrade() else {
            return;
        };
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(message_id = %message_id, "No tokio runtime, component event not forwarded");
            return;
        };
        let message_id = message_id.clone();
        let event = event.clone();
        runtime.spawn(async move {
            if let Err(error) = inner
                .receive_component_event(&message_id, &event.event_type, event.payload)
                .await
            {
                tracing::warn!(message_id = %message_id, error = %error, "Component event forward failed");
            }
        });
    })
}
