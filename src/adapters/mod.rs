//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the engine to concrete backends:
//! - `events` - Widget event bus (in-memory)
//! - `transport` - Chat transports (in-memory mock)

pub mod events;
pub mod transport;

pub use events::InMemoryWidgetEventBus;
pub use transport::{MockCalls, MockTransport};
