//! ScopedEventBus - publish/subscribe between one GenUI message's components
//! and the backend stream that produced it.
//!
//! ```text
//!   UI component --send_event--> listeners on this bus
//!                          \--> forwarder --> Engine --> transport
//!   backend event chunk --deliver--> listeners (queued until one matches)
//! ```
//!
//! A listener registered with a target id only hears events whose source id
//! equals that target. A listener without a target hears every event of its type.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::domain::foundation::sync::lock;
use crate::domain::foundation::{MessageId, StreamId};

/// Backend events held while no listener matches. Oldest are dropped first.
const MAX_PENDING_EVENTS: usize = 256;

/// An event travelling over a scoped bus.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEvent {
    pub event_type: String,
    pub payload: Value,
    pub source_id: Option<String>,
}

impl ComponentEvent {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            source_id: None,
        }
    }

    pub fn from_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }
}

/// Callback invoked for a matching event.
pub type ComponentEventListener = Arc<dyn Fn(&ComponentEvent) + Send + Sync>;

/// Receives every UI-originated event so it can be bubbled to the transport.
pub type EventForwarder = Arc<dyn Fn(&MessageId, &ComponentEvent) + Send + Sync>;

/// Handle returned by `listen_event`, used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    event_type: String,
    target_id: Option<String>,
    callback: ComponentEventListener,
}

impl Listener {
    fn matches(&self, event: &ComponentEvent) -> bool {
        self.event_type == event.event_type
            && match &self.target_id {
                None => true,
                Some(target) => event.source_id.as_deref() == Some(target.as_str()),
            }
    }
}

#[derive(Default)]
struct BusState {
    next_listener: u64,
    listeners: Vec<Listener>,
    pending: VecDeque<ComponentEvent>,
}

/// Event bus scoped to a single GenUI message.
pub struct ScopedEventBus {
    message_id: MessageId,
    stream_id: StreamId,
    state: Mutex<BusState>,
    forwarder: Option<EventForwarder>,
}

impl ScopedEventBus {
    pub fn new(message_id: MessageId, stream_id: StreamId) -> Self {
        Self {
            message_id,
            stream_id,
            state: Mutex::new(BusState::default()),
            forwarder: None,
        }
    }

    pub fn with_forwarder(mut self, forwarder: EventForwarder) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// Emits a UI-originated event: local listeners first, then the forwarder.
    ///
    /// Returns how many local listeners received it.
    pub fn send_event(&self, event_type: impl Into<String>, payload: Value, source_id: Option<&str>) -> usize {
        let event = ComponentEvent {
            event_type: event_type.into(),
            payload,
            source_id: source_id.map(str::to_string),
        };
        let delivered = self.dispatch(&event);
        if let Some(forwarder) = &self.forwarder {
            forwarder(&self.message_id, &event);
        }
        delivered
    }

    /// Registers `callback` for `event_type`, optionally only for events
    /// whose source id equals `target_id`.
    ///
    /// Queued backend events that match are delivered to this listener
    /// before the call returns.
    pub fn listen_event(
        &self,
        event_type: impl Into<String>,
        callback: impl Fn(&ComponentEvent) + Send + Sync + 'static,
        target_id: Option<&str>,
    ) -> ListenerId {
        let callback: ComponentEventListener = Arc::new(callback);
        let (id, backlog) = {
            let mut state = lock(&self.state);
            state.next_listener += 1;
            let listener = Listener {
                id: ListenerId(state.next_listener),
                event_type: event_type.into(),
                target_id: target_id.map(str::to_string),
                callback: Arc::clone(&callback),
            };
            let (backlog, rest): (VecDeque<_>, VecDeque<_>) =
                state.pending.drain(..).partition(|e| listener.matches(e));
            state.pending = rest;
            let id = listener.id;
            state.listeners.push(listener);
            (id, backlog)
        };
        for event in &backlog {
            callback(event);
        }
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = lock(&self.state);
        let before = state.listeners.len();
        state.listeners.retain(|l| l.id != id);
        state.listeners.len() != before
    }

    /// Delivers a backend event, queueing it if nothing is listening for it yet.
    pub(crate) fn deliver_from_stream(&self, event: ComponentEvent) {
        if self.dispatch(&event) > 0 {
            return;
        }
        let mut state = lock(&self.state);
        if state.pending.len() == MAX_PENDING_EVENTS {
            state.pending.pop_front();
            tracing::debug!(message_id = %self.message_id, "Pending event queue full, dropping oldest");
        }
        state.pending.push_back(event);
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.state).pending.len()
    }

    fn dispatch(&self, event: &ComponentEvent) -> usize {
        // Clone callbacks so listeners may re-enter the bus.
        let targets: Vec<ComponentEventListener> = lock(&self.state)
            .listeners
            .iter()
            .filter(|l| l.matches(event))
            .map(|l| Arc::clone(&l.callback))
            .collect();
        for callback in &targets {
            callback(event);
        }
        targets.len()
    }
}

impl fmt::Debug for ScopedEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedEventBus")
            .field("message_id", &self.message_id)
            .field("stream_id", &self.stream_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bus() -> ScopedEventBus {
        ScopedEventBus::new(MessageId::new("genui-s1"), StreamId::new("s1"))
    }

    fn recorder() -> (Arc<Mutex<Vec<ComponentEvent>>>, impl Fn(&ComponentEvent) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |e: &ComponentEvent| sink.lock().unwrap().push(e.clone()))
    }

    #[test]
    fn untargeted_listener_hears_every_source() {
        let bus = bus();
        let (seen, cb) = recorder();
        bus.listen_event("click", cb, None);

        bus.send_event("click", json!(1), Some("a"));
        bus.send_event("click", json!(2), None);
        bus.send_event("hover", json!(3), None);

        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn targeted_listener_hears_only_its_source() {
        let bus = bus();
        let (seen, cb) = recorder();
        bus.listen_event("select", cb, Some("chart-1"));

        assert_eq!(bus.send_event("select", json!({}), Some("chart-2")), 0);
        assert_eq!(bus.send_event("select", json!({}), None), 0);
        assert_eq!(bus.send_event("select", json!({}), Some("chart-1")), 1);

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn send_event_reaches_forwarder() {
        let forwarded = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&forwarded);
        let bus = bus().with_forwarder(Arc::new(move |id: &MessageId, e: &ComponentEvent| {
            sink.lock().unwrap().push((id.clone(), e.event_type.clone()));
        }));

        bus.send_event("submit", json!({"ok": true}), None);

        assert_eq!(
            *forwarded.lock().unwrap(),
            vec![(MessageId::new("genui-s1"), "submit".to_string())]
        );
    }

    #[test]
    fn stream_events_queue_until_a_listener_matches() {
        let bus = bus();
        bus.deliver_from_stream(ComponentEvent::new("refresh", json!(1)).from_source("ui-2"));
        bus.deliver_from_stream(ComponentEvent::new("other", json!(2)));
        assert_eq!(bus.pending_count(), 2);

        let (seen, cb) = recorder();
        bus.listen_event("refresh", cb, Some("ui-2"));

        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(bus.pending_count(), 1);
    }

    #[test]
    fn stream_events_do_not_reach_forwarder() {
        let forwarded = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&forwarded);
        let bus = bus().with_forwarder(Arc::new(move |_: &MessageId, _: &ComponentEvent| {
            *sink.lock().unwrap() += 1;
        }));

        bus.deliver_from_stream(ComponentEvent::new("refresh", json!(null)));

        assert_eq!(*forwarded.lock().unwrap(), 0);
    }

    #[test]
    fn removed_listener_stops_receiving() {
        let bus = bus();
        let (seen, cb) = recorder();
        let id = bus.listen_event("click", cb, None);

        assert!(bus.remove_listener(id));
        bus.send_event("click", json!(null), None);

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(bus.listener_count(), 0);
    }
}
