//! In-memory widget event bus.
//!
//! Synchronous, in-process delivery. Handlers run on the publishing thread in
//! subscription order. Recording of published events is opt-in, for tests
//! and debugging panels.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::foundation::sync::{read, write};
use crate::ports::{
    WidgetEvent, WidgetEventHandler, WidgetEventKind, WidgetEventPublisher, WidgetEventSubscriber,
};

/// In-memory widget event bus.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryWidgetEventBus::recording());
/// bus.subscribe(WidgetEventKind::MessageReceived, badge_updater);
///
/// // Assert in tests
/// assert!(bus.has_event(WidgetEventKind::MessageReceived));
/// ```
pub struct InMemoryWidgetEventBus {
    handlers: RwLock<HashMap<WidgetEventKind, Vec<Arc<dyn WidgetEventHandler>>>>,
    published: Option<RwLock<Vec<WidgetEvent>>>,
}

impl InMemoryWidgetEventBus {
    /// Creates a bus that only delivers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            published: None,
        }
    }

    /// Creates a bus that also keeps every published event.
    pub fn recording() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            published: Some(RwLock::new(Vec::new())),
        }
    }

    /// Returns all recorded events (empty unless built with `recording`).
    pub fn published_events(&self) -> Vec<WidgetEvent> {
        self.published
            .as_ref()
            .map(|p| read(p).clone())
            .unwrap_or_default()
    }

    /// Returns recorded events of one kind.
    pub fn events_of_kind(&self, kind: WidgetEventKind) -> Vec<WidgetEvent> {
        self.published_events()
            .into_iter()
            .filter(|e| e.kind() == kind)
            .collect()
    }

    /// Checks if an event of `kind` was recorded.
    pub fn has_event(&self, kind: WidgetEventKind) -> bool {
        self.published
            .as_ref()
            .is_some_and(|p| read(p).iter().any(|e| e.kind() == kind))
    }

    /// Returns count of recorded events.
    pub fn event_count(&self) -> usize {
        self.published.as_ref().map_or(0, |p| read(p).len())
    }

    /// Clears recorded events.
    pub fn clear(&self) {
        if let Some(published) = &self.published {
            write(published).clear();
        }
    }

    /// Number of handlers subscribed to `kind`.
    pub fn handler_count(&self, kind: WidgetEventKind) -> usize {
        read(&self.handlers).get(&kind).map_or(0, Vec::len)
    }
}

impl Default for InMemoryWidgetEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetEventPublisher for InMemoryWidgetEventBus {
    fn publish(&self, event: WidgetEvent) {
        if let Some(published) = &self.published {
            write(published).push(event.clone());
        }

        // Clone handlers to release the lock before invoking them
        let kind_handlers: Vec<Arc<dyn WidgetEventHandler>> = read(&self.handlers)
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();

        for handler in kind_handlers {
            tracing::trace!(handler = handler.name(), kind = ?event.kind(), "Delivering widget event");
            handler.handle(&event);
        }
    }
}

impl WidgetEventSubscriber for InMemoryWidgetEventBus {
    fn subscribe(&self, kind: WidgetEventKind, handler: Arc<dyn WidgetEventHandler>) {
        let mut handlers = write(&self.handlers);
        let entry = handlers.entry(kind).or_default();
        if entry.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            return;
        }
        entry.push(handler);
    }

    fn unsubscribe(&self, kind: WidgetEventKind, handler: &Arc<dyn WidgetEventHandler>) -> bool {
        let mut handlers = write(&self.handlers);
        let Some(entry) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|h| !Arc::ptr_eq(h, handler));
        entry.len() != before
    }
}
