//! Logging configuration

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use super::error::ValidationError;

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Filter from `RUST_LOG`, falling back to the configured level.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }

    /// Installs the global tracing subscriber.
    ///
    /// Returns `false` if a subscriber was already installed.
    pub fn init_tracing(&self) -> bool {
        let builder = tracing_subscriber::fmt().with_env_filter(self.env_filter());
        let installed = if self.json {
            builder.json().try_init().is_ok()
        } else {
            builder.try_init().is_ok()
        };
        if installed {
            tracing::debug!(level = %self.level, json = self.json, "Tracing initialized");
        }
        installed
    }

    /// Validate logging configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.level
            .parse::<tracing::Level>()
            .map(|_| ())
            .map_err(|_| ValidationError::InvalidLogLevel(self.level.clone()))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_levels_accepted() {
        for level in ["trace", "debug", "info", "warn", "error", "WARN"] {
            let config = LoggingConfig { level: level.to_string(), json: false };
            assert!(config.validate().is_ok(), "{level} should be valid");
        }
    }

    #[test]
    fn test_unknown_level_rejected() {
        let config = LoggingConfig { level: "loud".to_string(), json: false };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidLogLevel("loud".to_string()))
        );
    }

    #[test]
    fn test_second_init_reports_existing_subscriber() {
        let config = LoggingConfig::default();
        config.init_tracing();
        assert!(!config.init_tracing());
    }
}
