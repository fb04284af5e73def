//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Reconnect max_attempts must be at least 1")]
    InvalidReconnectAttempts,

    #[error("Reconnect base_delay_ms must be greater than zero")]
    InvalidReconnectDelay,

    #[error("Command prefix must not be empty")]
    EmptyCommandPrefix,

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),
}
