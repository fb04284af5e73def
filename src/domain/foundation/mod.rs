//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, the connection status machine, and
//! error types that form the vocabulary of the orchestration engine.

mod connection_status;
mod errors;
mod ids;
mod state_machine;
pub(crate) mod sync;
mod timestamp;

pub use connection_status::ConnectionStatus;
pub use errors::ValidationError;
pub use ids::{ConversationId, MessageId, StreamId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
