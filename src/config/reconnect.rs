//! Reconnect backoff configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Linear backoff applied after an unexpected disconnect.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Attempts before giving up with status `error`
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay unit; attempt n waits n * base_delay_ms
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2000
}

impl ReconnectConfig {
    /// Delay before the given 1-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }

    /// Validate reconnect configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidReconnectAttempts);
        }
        if self.base_delay_ms == 0 {
            return Err(ValidationError::InvalidReconnectDelay);
        }
        Ok(())
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}
