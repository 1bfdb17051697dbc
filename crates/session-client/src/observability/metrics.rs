//! Metric recording functions.
//!
//! All metrics use the `session_` prefix, `_total` for counters and
//! `_seconds` for duration histograms.

use crate::state::ConnectionStatus;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

// ============================================================================
// State Machine
// ============================================================================

/// Record a connection status change.
///
/// Metric: `session_state_transitions_total`
/// Labels: `from`, `to`
pub fn record_state_transition(from: ConnectionStatus, to: ConnectionStatus) {
    counter!(
        "session_state_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

/// Record how long the session spent reconnecting before it recovered or
/// ended.
///
/// Metric: `session_reconnect_duration_seconds`
pub fn record_reconnect_duration(duration: Duration) {
    histogram!("session_reconnect_duration_seconds").record(duration.as_secs_f64());
}

// ============================================================================
// Signals
// ============================================================================

/// Record an outbound signal outcome.
///
/// Metric: `session_signals_total`
/// Labels: `outcome` (sent, queued, dropped, rejected, failed, discarded)
pub fn record_signal(outcome: &'static str) {
    counter!("session_signals_total", "outcome" => outcome).increment(1);
}

// ============================================================================
// Per-session gauges
// ============================================================================

/// One session's share of the process-wide gauges.
///
/// Several sessions may run in one process, so gauges move by deltas rather
/// than being overwritten. Dropping the tracker withdraws whatever it still
/// contributes.
///
/// Metrics: `session_pending_signals`, `session_streams_active`,
/// `session_connections_active`
#[derive(Debug, Default)]
pub struct SessionGauges {
    pending_signals: usize,
    streams: usize,
    connections: usize,
}

impl SessionGauges {
    /// Create a tracker that contributes nothing yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals this session holds for reconnect.
    pub fn set_pending_signals(&mut self, depth: usize) {
        adjust_gauge("session_pending_signals", &mut self.pending_signals, depth);
    }

    /// Streams in this session's registry.
    pub fn set_streams(&mut self, count: usize) {
        adjust_gauge("session_streams_active", &mut self.streams, count);
    }

    /// Connections in this session's registry.
    pub fn set_connections(&mut self, count: usize) {
        adjust_gauge("session_connections_active", &mut self.connections, count);
    }

    /// Withdraw everything this session contributes.
    pub fn clear(&mut self) {
        self.set_pending_signals(0);
        self.set_streams(0);
        self.set_connections(0);
    }
}

impl Drop for SessionGauges {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Move a shared gauge from `*current` to `next`.
#[allow(clippy::cast_precision_loss)]
fn adjust_gauge(name: &'static str, current: &mut usize, next: usize) {
    if next > *current {
        gauge!(name).increment((next - *current) as f64);
    } else if next < *current {
        gauge!(name).decrement((*current - next) as f64);
    }
    *current = next;
}

// ============================================================================
// Moderation
// ============================================================================

/// Record a force-mute command issued by the local client.
///
/// Metric: `session_force_mute_total`
/// Labels: `action` (all, stream, disable)
pub fn record_force_mute(action: &'static str) {
    counter!("session_force_mute_total", "action" => action).increment(1);
}

// ============================================================================
// Actor
// ============================================================================

/// Move one actor's contribution to the mailbox depth gauge from
/// `previous` to `current`.
///
/// Metric: `session_mailbox_depth`
pub fn update_mailbox_depth(previous: usize, current: usize) {
    let mut tracked = previous;
    adjust_gauge("session_mailbox_depth", &mut tracked, current);
}

/// Record an observer notification.
///
/// Metric: `session_events_total`
/// Labels: `event` (bounded by `SessionEvent` variants)
pub fn record_event_dispatched(event: &'static str) {
    counter!("session_events_total", "event" => event).increment(1);
}

/// Record a failed intent call or transport hand-off.
///
/// Metric: `session_errors_total`
/// Labels: `operation`, `error_type`
pub fn record_error(operation: &'static str, error_type: &'static str) {
    counter!(
        "session_errors_total",
        "operation" => operation,
        "error_type" => error_type
    )
    .increment(1);
}
