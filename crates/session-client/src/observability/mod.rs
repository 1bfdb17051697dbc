//! Observability for the session client.
//!
//! The library only emits through the `metrics` facade and `tracing`; the
//! embedding application decides which recorder and subscriber to install.
//!
//! # Privacy
//!
//! Credentials, encryption secrets and signal payloads are never logged or
//! used as metric labels. Labels are bounded:
//! - `from`/`to`: 6 connection statuses
//! - `outcome`: 6 signal outcomes
//! - `action`: 3 force-mute actions
//! - `operation`/`error_type`: bounded by code
//!
//! Gauges carry no session label. Each session adds and withdraws its own
//! share, so with several sessions in one process they report totals.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `session_state_transitions_total` | Counter | `from`, `to` | Connection status changes |
//! | `session_signals_total` | Counter | `outcome` | Outbound signal routing |
//! | `session_pending_signals` | Gauge | none | Signals queued during reconnect, all sessions |
//! | `session_streams_active` | Gauge | none | Registered streams, all sessions |
//! | `session_connections_active` | Gauge | none | Registered connections, all sessions |
//! | `session_force_mute_total` | Counter | `action` | Moderation commands issued |
//! | `session_reconnect_duration_seconds` | Histogram | none | Time spent reconnecting |
//! | `session_mailbox_depth` | Gauge | none | Backlog summed over actors |
//! | `session_errors_total` | Counter | `operation`, `error_type` | Failed intent calls |

pub mod metrics;

pub use self::metrics::{
    record_error, record_event_dispatched, record_force_mute, record_reconnect_duration,
    record_signal, record_state_transition, update_mailbox_depth, SessionGauges,
};
