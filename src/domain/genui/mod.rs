//! GenUI module - chunked streaming replies and their per-message event buses.

mod assembler;
mod chunk;
mod event_bus;

pub use assembler::{ChunkOutcome, StreamAssembler};
pub use chunk::{AIChunk, StreamState};
pub use event_bus::{ComponentEvent, ComponentEventListener, EventForwarder, ListenerId, ScopedEventBus};
