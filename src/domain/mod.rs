//! Domain layer - message, conversation, command, and GenUI state.
//!
//! Nothing in here performs I/O. The application layer drives these types
//! in response to transport callbacks and caller actions.

pub mod command;
pub mod conversation;
pub mod foundation;
pub mod genui;
pub mod message;
