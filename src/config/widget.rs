//! Widget behaviour configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Widget surface and command settings
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WidgetConfig {
    /// Whether the chat surface starts open
    #[serde(default)]
    pub start_open: bool,

    /// Prefix that marks submitted text as a slash command
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Keep every published widget event in memory (for tests and debugging)
    #[serde(default)]
    pub record_events: bool,
}

fn default_command_prefix() -> String {
    "/".to_string()
}

impl WidgetConfig {
    /// Validate widget configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.command_prefix.is_empty() {
            return Err(ValidationError::EmptyCommandPrefix);
        }
        Ok(())
    }
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            start_open: false,
            command_prefix: default_command_prefix(),
            record_events: false,
        }
    }
}
