//! Transport adapters.
//!
//! - `MockTransport` - in-memory transport with scripting and call tracking

mod mock;

pub use mock::{MockCalls, MockTransport};
