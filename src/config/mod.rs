//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `CHAT_ORCHESTRATOR` prefix and nested values use double underscores as separators.
//! Every section has defaults, so an empty environment yields a usable config.
//!
//! # Example
//!
//! ```no_run
//! use chat_orchestrator::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! config.logging.init_tracing();
//! ```

mod error;
mod logging;
mod reconnect;
mod widget;

pub use error::{ConfigError, ValidationError};
pub use logging::LoggingConfig;
pub use reconnect::ReconnectConfig;
pub use widget::WidgetConfig;

use serde::Deserialize;
use std::path::Path;

const ENV_PREFIX: &str = "CHAT_ORCHESTRATOR";

/// Root configuration for an engine instance.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Reconnect backoff
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Tracing subscriber settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Widget surface and slash commands
    #[serde(default)]
    pub widget: WidgetConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `CHAT_ORCHESTRATOR` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `CHAT_ORCHESTRATOR__RECONNECT__MAX_ATTEMPTS=5` -> `reconnect.max_attempts = 5`
    /// - `CHAT_ORCHESTRATOR__LOGGING__JSON=true` -> `logging.json = true`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration from a TOML, YAML or JSON file, with environment
    /// variables taking precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, malformed, or holds values
    /// of the wrong type.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(environment())
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.reconnect.validate()?;
        self.logging.validate()?;
        self.widget.validate()?;
        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::default()
        .prefix(ENV_PREFIX)
        .separator("__")
}
