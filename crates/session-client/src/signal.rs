//! Signal dispatcher: validation, routing and reconnect buffering of
//! application signals.
//!
//! Outbound signals are validated synchronously. While `Connected` they go
//! straight to the transport; while `Reconnecting` they are queued (when
//! `retry_after_reconnect` is set) or dropped silently. Queued signals are
//! flushed in FIFO order once the session reconnects and discarded if it does
//! not. Inbound signals are not buffered here.

use crate::errors::{InvalidArgumentError, SessionError};
use crate::state::ConnectionStatus;
use common::types::ConnectionId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default maximum signal type length in characters.
pub const DEFAULT_MAX_SIGNAL_TYPE_LENGTH: usize = 128;

/// Default maximum signal payload size in bytes (8 KB).
pub const DEFAULT_MAX_SIGNAL_PAYLOAD_BYTES: usize = 8192;

/// A signal to hand to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundSignal {
    /// Application-defined signal type (may be empty).
    pub signal_type: String,
    /// Payload string.
    pub payload: String,
    /// Destination connection; `None` signals every participant.
    pub destination: Option<ConnectionId>,
}

/// A signal held while the session is reconnecting.
#[derive(Debug, Clone)]
pub struct PendingSignal {
    /// The signal to send after reconnect.
    pub signal: OutboundSignal,
    /// When the signal was queued.
    pub queued_at: Instant,
}

impl PendingSignal {
    /// Time spent in the queue so far.
    #[must_use]
    pub fn waited(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// Where a validated signal went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalRoute {
    /// Forward to the transport now.
    SendNow(OutboundSignal),
    /// Held until the session reconnects.
    Queued,
    /// Dropped (reconnecting without retry).
    Dropped,
}

/// Validates and routes outbound signals.
#[derive(Debug)]
pub struct SignalDispatcher {
    max_type_length: usize,
    max_payload_bytes: usize,
    pending: VecDeque<PendingSignal>,
}

impl Default for SignalDispatcher {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_SIGNAL_TYPE_LENGTH,
            DEFAULT_MAX_SIGNAL_PAYLOAD_BYTES,
        )
    }
}

impl SignalDispatcher {
    /// Create a dispatcher with the given limits.
    #[must_use]
    pub fn new(max_type_length: usize, max_payload_bytes: usize) -> Self {
        Self {
            max_type_length,
            max_payload_bytes,
            pending: VecDeque::new(),
        }
    }

    /// Validate a signal's type and payload.
    ///
    /// # Errors
    ///
    /// - [`InvalidArgumentError::InvalidSignalType`] for characters outside
    ///   letters, digits, `-`, `_`, `~`
    /// - [`InvalidArgumentError::SignalTypeTooLong`] above the type limit
    /// - [`InvalidArgumentError::SignalDataTooLong`] above the payload limit
    pub fn validate(&self, signal_type: &str, payload: &str) -> Result<(), InvalidArgumentError> {
        if !signal_type.chars().all(is_signal_type_char) {
            return Err(InvalidArgumentError::InvalidSignalType);
        }

        let type_len = signal_type.chars().count();
        if type_len > self.max_type_length {
            return Err(InvalidArgumentError::SignalTypeTooLong {
                len: type_len,
                max: self.max_type_length,
            });
        }

        if payload.len() > self.max_payload_bytes {
            return Err(InvalidArgumentError::SignalDataTooLong {
                len: payload.len(),
                max: self.max_payload_bytes,
            });
        }

        Ok(())
    }

    /// Route an already validated signal according to the session status.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotConnected`] unless the session is
    /// `Connected` or `Reconnecting`.
    pub fn route(
        &mut self,
        signal: OutboundSignal,
        status: ConnectionStatus,
        retry_after_reconnect: bool,
    ) -> Result<SignalRoute, SessionError> {
        match status {
            ConnectionStatus::Connected => Ok(SignalRoute::SendNow(signal)),
            ConnectionStatus::Reconnecting if retry_after_reconnect => {
                self.pending.push_back(PendingSignal {
                    signal,
                    queued_at: Instant::now(),
                });
                debug!(
                    target: "session.signal",
                    pending = self.pending.len(),
                    "Signal queued until reconnect"
                );
                Ok(SignalRoute::Queued)
            }
            ConnectionStatus::Reconnecting => {
                debug!(
                    target: "session.signal",
                    "Signal dropped while reconnecting (retry disabled)"
                );
                Ok(SignalRoute::Dropped)
            }
            status => Err(SessionError::NotConnected { status }),
        }
    }

    /// Take every queued signal in FIFO order.
    pub fn drain_pending(&mut self) -> Vec<PendingSignal> {
        self.pending.drain(..).collect()
    }

    /// Drop every queued signal, returning how many were discarded.
    pub fn discard_pending(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Number of queued signals.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn is_signal_type_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '~')
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn signal(signal_type: &str, payload: &str) -> OutboundSignal {
        OutboundSignal {
            signal_type: signal_type.to_string(),
            payload: payload.to_string(),
            destination: None,
        }
    }

    #[test]
    fn test_validate_allowed_characters() {
        let dispatcher = SignalDispatcher::default();
        assert!(dispatcher.validate("chat", "hi").is_ok());
        assert!(dispatcher.validate("a-b_c~D9", "").is_ok());
        assert!(dispatcher.validate("", "untyped").is_ok());
    }

    #[test]
    fn test_validate_rejects_space_and_punctuation() {
        let dispatcher = SignalDispatcher::default();
        for bad in ["chat message", "chat!", "a/b", "emoji🙂", "tab\t"] {
            assert_eq!(
                dispatcher.validate(bad, "x"),
                Err(InvalidArgumentError::InvalidSignalType),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_validate_type_length() {
        let dispatcher = SignalDispatcher::default();
        let at_limit = "t".repeat(DEFAULT_MAX_SIGNAL_TYPE_LENGTH);
        assert!(dispatcher.validate(&at_limit, "").is_ok());

        let over = "t".repeat(DEFAULT_MAX_SIGNAL_TYPE_LENGTH + 1);
        assert_eq!(
            dispatcher.validate(&over, ""),
            Err(InvalidArgumentError::SignalTypeTooLong {
                len: DEFAULT_MAX_SIGNAL_TYPE_LENGTH + 1,
                max: DEFAULT_MAX_SIGNAL_TYPE_LENGTH,
            })
        );
    }

    #[test]
    fn test_validate_payload_counts_bytes() {
        let dispatcher = SignalDispatcher::new(16, 8);
        assert!(dispatcher.validate("t", "12345678").is_ok());
        // 'é' is two bytes in UTF-8
        assert!(matches!(
            dispatcher.validate("t", "éééé1"),
            Err(InvalidArgumentError::SignalDataTooLong { len: 9, max: 8 })
        ));
    }

    #[test]
    fn test_route_connected_sends_now() {
        let mut dispatcher = SignalDispatcher::default();
        let route = dispatcher
            .route(signal("chat", "hi"), ConnectionStatus::Connected, true)
            .unwrap();
        assert_eq!(route, SignalRoute::SendNow(signal("chat", "hi")));
        assert_eq!(dispatcher.pending_len(), 0);
    }

    #[test]
    fn test_route_reconnecting_queues_in_fifo_order() {
        let mut dispatcher = SignalDispatcher::default();
        for payload in ["one", "two", "three"] {
            let route = dispatcher
                .route(signal("chat", payload), ConnectionStatus::Reconnecting, true)
                .unwrap();
            assert_eq!(route, SignalRoute::Queued);
        }

        let drained: Vec<_> = dispatcher
            .drain_pending()
            .into_iter()
            .map(|p| p.signal.payload)
            .collect();
        assert_eq!(drained, vec!["one", "two", "three"]);
        assert_eq!(dispatcher.pending_len(), 0);
    }

    #[test]
    fn test_queued_signals_record_queue_time() {
        let mut dispatcher = SignalDispatcher::default();
        let before = Instant::now();
        dispatcher
            .route(signal("chat", "one"), ConnectionStatus::Reconnecting, true)
            .unwrap();
        dispatcher
            .route(signal("chat", "two"), ConnectionStatus::Reconnecting, true)
            .unwrap();

        let drained = dispatcher.drain_pending();
        assert_eq!(drained.len(), 2);
        assert!(drained.iter().all(|p| p.queued_at >= before));
        assert!(drained
            .windows(2)
            .all(|pair| matches!(pair, [older, newer] if older.queued_at <= newer.queued_at)));
        assert!(drained.iter().all(|p| p.waited() <= before.elapsed()));
    }

    #[test]
    fn test_route_reconnecting_without_retry_drops() {
        let mut dispatcher = SignalDispatcher::default();
        let route = dispatcher
            .route(signal("chat", "hi"), ConnectionStatus::Reconnecting, false)
            .unwrap();
        assert_eq!(route, SignalRoute::Dropped);
        assert_eq!(dispatcher.pending_len(), 0);
    }

    #[test]
    fn test_route_rejects_other_states() {
        let mut dispatcher = SignalDispatcher::default();
        for status in [
            ConnectionStatus::NotConnected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Disconnecting,
            ConnectionStatus::Failed,
        ] {
            assert_eq!(
                dispatcher.route(signal("chat", "hi"), status, true),
                Err(SessionError::NotConnected { status })
            );
        }
    }

    #[test]
    fn test_discard_pending() {
        let mut dispatcher = SignalDispatcher::default();
        dispatcher
            .route(signal("a", "1"), ConnectionStatus::Reconnecting, true)
            .unwrap();
        dispatcher
            .route(signal("b", "2"), ConnectionStatus::Reconnecting, true)
            .unwrap();
        assert_eq!(dispatcher.discard_pending(), 2);
        assert!(dispatcher.drain_pending().is_empty());
    }
}
