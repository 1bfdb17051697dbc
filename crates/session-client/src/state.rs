//! Session connection status and its legal transitions.
//!
//! ```text
//! NotConnected ──connect──▶ Connecting ──connected──▶ Connected ◀──reconnected──┐
//!      ▲                        │                        │                      │
//!      │                        │                        └──reconnecting──▶ Reconnecting
//!      │                        │                                               │
//!      └───── disconnected ── Disconnecting ◀──────── disconnect ───────────────┘
//!
//! Failed is terminal and reachable from Connecting, Connected and Reconnecting.
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Not connected (initial state, and after a completed disconnect).
    NotConnected,
    /// Connect requested, waiting for the transport.
    Connecting,
    /// Connected to the session.
    Connected,
    /// Network lost, the transport is trying to recover.
    Reconnecting,
    /// Disconnect requested, waiting for the transport to confirm closure.
    Disconnecting,
    /// Fatal error; a new session instance is required.
    Failed,
}

impl ConnectionStatus {
    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::{
            Connected, Connecting, Disconnecting, Failed, NotConnected, Reconnecting,
        };

        matches!(
            (self, next),
            (NotConnected, Connecting)
                | (Connecting, Connected | Failed | Disconnecting | NotConnected)
                | (Connected, Reconnecting | Disconnecting | Failed | NotConnected)
                | (Reconnecting, Connected | Disconnecting | Failed | NotConnected)
                | (Disconnecting, NotConnected)
        )
    }

    /// Whether publish/subscribe/signal/force-mute calls are accepted.
    #[must_use]
    pub fn accepts_intents(self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connected | ConnectionStatus::Reconnecting
        )
    }

    /// Whether a network session exists that may need closing.
    #[must_use]
    pub fn has_network_session(self) -> bool {
        matches!(
            self,
            ConnectionStatus::Connecting
                | ConnectionStatus::Connected
                | ConnectionStatus::Reconnecting
        )
    }

    /// Label used for metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::NotConnected => "not_connected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Disconnecting => "disconnecting",
            ConnectionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::NotConnected => "not connected",
            other => other.as_str(),
        };
        f.write_str(label)
    }
}
