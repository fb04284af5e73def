//! StreamAssembler - folds chunked bot replies into one evolving message.
//!
//! Each stream id owns exactly one `"genui"` message plus one scoped event
//! bus for its whole lifetime. Text and ui chunks grow the message in place
//! through `MessageLog::modify_by_id`; event chunks go to the bus only.
//!
//! The stream state lives here, not in the log. While a stream's message is
//! out of the log (cached away by a conversation switch) chunks keep growing
//! that state and are reported as `detached`, and `sync` writes the latest
//! state back when the message is restored. Incomplete streams survive
//! `prune`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::foundation::sync::lock;
use crate::domain::foundation::{MessageId, StreamId, Timestamp};
use crate::domain::message::{
    MessageLog, MessagePayload, Sender, StoredMessage, GENUI_MESSAGE_TYPE,
};

use super::{AIChunk, ComponentEvent, EventForwarder, ScopedEventBus, StreamState};

/// What applying one chunk did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub message_id: MessageId,
    /// The stream's message was created by this chunk.
    pub started: bool,
    /// The chunk was added to the stream's content.
    pub appended: bool,
    /// The stream completed with this chunk (reported once per stream).
    pub completed: bool,
    /// New stream payload for a message that is not in the log right now.
    pub detached: Option<MessagePayload>,
}

struct StreamEntry {
    message_id: MessageId,
    state: StreamState,
    bus: Arc<ScopedEventBus>,
}

#[derive(Default)]
struct AssemblerState {
    streams: HashMap<StreamId, StreamEntry>,
    origins: HashMap<MessageId, StreamId>,
}

/// Assembles GenUI streams into the message log.
#[derive(Default)]
pub struct StreamAssembler {
    state: Mutex<AssemblerState>,
    forwarder: Option<EventForwarder>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every bus created by this assembler bubbles UI events to `forwarder`.
    pub fn with_forwarder(forwarder: EventForwarder) -> Self {
        Self {
            state: Mutex::new(AssemblerState::default()),
            forwarder: Some(forwarder),
        }
    }

    /// Preferred log id of the message backing `stream_id`.
    pub fn message_id_for(stream_id: &StreamId) -> MessageId {
        MessageId::new(format!("genui-{}", stream_id))
    }

    /// First candidate id for `stream_id` that is free in `log` or already
    /// holds a GenUI message. Ids taken by other message types get a suffix.
    fn resolve_message_id(log: &MessageLog, stream_id: &StreamId) -> MessageId {
        let mut candidate = Self::message_id_for(stream_id);
        let mut suffix = 1u32;
        while let Some(existing) = log.get(&candidate) {
            if existing.message_type == GENUI_MESSAGE_TYPE {
                break;
            }
            tracing::debug!(message_id = %candidate, "GenUI id taken by another message");
            candidate = MessageId::new(format!("genui-{}-{}", stream_id, suffix));
            suffix += 1;
        }
        candidate
    }

    /// Applies one chunk of `stream_id` to `log`.
    pub fn apply(&self, log: &MessageLog, stream_id: &StreamId, chunk: AIChunk, done: bool) -> ChunkOutcome {
        let mut state = lock(&self.state);
        let (entry, started) = self.entry(&mut state, log, stream_id);
        let message_id = entry.message_id.clone();

        if entry.state.streaming_complete {
            tracing::debug!(stream_id = %stream_id, "Chunk after stream completion ignored");
            return ChunkOutcome {
                message_id,
                started,
                appended: false,
                completed: false,
                detached: None,
            };
        }

        let mut backend_event = None;
        let mut appended = false;
        match chunk {
            AIChunk::Event {
                name,
                payload,
                target,
                ..
            } => {
                backend_event = Some(ComponentEvent {
                    event_type: name,
                    payload,
                    source_id: target,
                });
            }
            chunk if entry.state.contains(chunk.id()) => {
                tracing::debug!(stream_id = %stream_id, chunk_id = chunk.id(), "Duplicate chunk ignored");
            }
            chunk => {
                entry.state.chunks.push(chunk);
                appended = true;
            }
        }

        let completed = done;
        if done {
            entry.state.streaming_complete = true;
        }
        let mut detached = None;
        if appended || completed {
            let payload = entry.state.to_payload();
            let in_log = log.modify_by_id(&message_id, |message| message.data = payload.clone());
            if !in_log {
                tracing::debug!(stream_id = %stream_id, "Chunk for a stream whose message is away");
                detached = Some(payload);
            }
        }

        let bus = Arc::clone(&entry.bus);
        drop(state);

        if let Some(event) = backend_event {
            bus.deliver_from_stream(event);
        }

        ChunkOutcome {
            message_id,
            started,
            appended,
            completed,
            detached,
        }
    }

    /// Writes the latest stream state into every stream message present in
    /// `log`. Returns how many messages changed.
    pub fn sync(&self, log: &MessageLog) -> usize {
        let state = lock(&self.state);
        let mut changed = 0;
        for entry in state.streams.values() {
            let payload = entry.state.to_payload();
            let stale = log
                .get(&entry.message_id)
                .is_some_and(|message| message.data != payload);
            if stale && log.modify_by_id(&entry.message_id, |message| message.data = payload) {
                changed += 1;
            }
        }
        changed
    }

    /// Stream that produced `message_id`, if any ever did.
    pub fn stream_for_message(&self, message_id: &MessageId) -> Option<StreamId> {
        lock(&self.state).origins.get(message_id).cloned()
    }

    /// Event bus of the GenUI message `message_id`.
    ///
    /// Rebuilt from the log if the stream was torn down while its message
    /// was away (e.g. cached by a conversation switch). `None` if the message
    /// is unknown or not in the log.
    pub fn bus(&self, log: &MessageLog, message_id: &MessageId) -> Option<Arc<ScopedEventBus>> {
        let mut state = lock(&self.state);
        let stream_id = state.origins.get(message_id)?.clone();
        if !state.streams.contains_key(&stream_id) && !log.contains(message_id) {
            return None;
        }
        let (entry, _) = self.entry(&mut state, log, &stream_id);
        Some(Arc::clone(&entry.bus))
    }

    /// Tears down completed streams whose message is no longer in `log`.
    pub fn prune(&self, log: &MessageLog) -> usize {
        let mut state = lock(&self.state);
        let before = state.streams.len();
        state
            .streams
            .retain(|_, entry| !entry.state.streaming_complete || log.contains(&entry.message_id));
        before - state.streams.len()
    }

    pub fn active_streams(&self) -> usize {
        lock(&self.state).streams.len()
    }

    fn entry<'a>(
        &self,
        state: &'a mut AssemblerState,
        log: &MessageLog,
        stream_id: &StreamId,
    ) -> (&'a mut StreamEntry, bool) {
        let AssemblerState { streams, origins } = state;
        let mut started = false;
        let entry = streams.entry(stream_id.clone()).or_insert_with(|| {
            let message_id = Self::resolve_message_id(log, stream_id);
            let stream_state = match log.get(&message_id) {
                // Message survived a teardown; continue from what it holds.
                Some(existing) => StreamState::from_payload(&existing.data).unwrap_or_default(),
                None => {
                    let fresh = StreamState::default();
                    started = log.add(StoredMessage {
                        id: message_id.clone(),
                        message_type: GENUI_MESSAGE_TYPE.to_string(),
                        data: fresh.to_payload(),
                        timestamp: Timestamp::now(),
                        sender: Some(Sender::Bot),
                        actions: Vec::new(),
                        status: None,
                        render: None,
                    });
                    fresh
                }
            };
            let mut bus = ScopedEventBus::new(message_id.clone(), stream_id.clone());
            if let Some(forwarder) = &self.forwarder {
                bus = bus.with_forwarder(Arc::clone(forwarder));
            }
            origins.insert(message_id.clone(), stream_id.clone());
            StreamEntry {
                message_id,
                state: stream_state,
                bus: Arc::new(bus),
            }
        });
        (entry, started)
    }
}
