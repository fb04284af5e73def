//! Widget event bus adapters.
//!
//! - `InMemoryWidgetEventBus` - synchronous, in-process bus

mod in_memory;

pub use in_memory::InMemoryWidgetEventBus;
