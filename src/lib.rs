//! Chat Orchestrator - message orchestration engine for embeddable chat widgets.
//!
//! The crate owns everything between a chat UI and its backend connection:
//! connection lifecycle with reconnect backoff, an extension pipeline that can
//! transform or drop messages, a deduplicating message log, switching between
//! conversations on one transport, and assembly of streamed "GenUI" bot replies
//! with a per-message component event bus.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use chat_orchestrator::adapters::MockTransport;
//! use chat_orchestrator::application::Engine;
//! use chat_orchestrator::domain::message::OutgoingMessage;
//!
//! # async fn run() -> Result<(), chat_orchestrator::application::EngineError> {
//! let engine = Engine::new(Arc::new(MockTransport::new()));
//! engine.init().await?;
//! engine.send(OutgoingMessage::text("hi")).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
