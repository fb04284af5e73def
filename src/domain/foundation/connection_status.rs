//! ConnectionStatus enum for the transport connection lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::StateMachine;

/// Connection lifecycle of the engine's transport.
///
/// ```text
/// idle --init--> connecting --ok--> connected --drop--> disconnected
///                    |                                      |
///                    +--fail--> error <--retries exhausted--+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    /// Returns true if messages can currently flow over the transport.
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl StateMachine for ConnectionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionStatus::*;
        matches!(
            (self, target),
            (Idle, Connecting)
                | (Idle, Disconnected)
                | (Connecting, Connected)
                | (Connecting, Error)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
                | (Connected, Connecting)
                | (Disconnected, Connecting)
                | (Disconnected, Connected)
                | (Disconnected, Error)
                | (Error, Connecting)
                | (Error, Disconnected)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionStatus::*;
        match self {
            Idle => vec![Connecting, Disconnected],
            Connecting => vec![Connected, Error, Disconnected],
            Connected => vec![Disconnected, Connecting],
            Disconnected => vec![Connecting, Connected, Error],
            Error => vec![Connecting, Disconnected],
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Idle => "idle",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}
