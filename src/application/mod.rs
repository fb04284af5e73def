//! Application layer - the engines that drive a transport.
//!
//! - `Engine` - connection lifecycle, send/receive, GenUI streams, history
//! - `ConversationEngine` - conversation switching over one engine
//! - `ExtensionPipeline` - ordered message transformers and lifecycle hooks

mod conversation_engine;
mod engine;
mod pipeline;

pub use conversation_engine::ConversationEngine;
pub use engine::{DetachedStreamHandler, Engine, EngineBuilder, EngineError, SubmitOutcome};
pub use pipeline::{
    Extension, ExtensionContext, ExtensionError, ExtensionPipeline, LifecycleHook, Transformer,
};
