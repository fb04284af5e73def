//! Command module - slash command registry.

mod registry;

pub use registry::{Command, CommandHandler, CommandInfo, CommandInvocation, CommandRegistry};
