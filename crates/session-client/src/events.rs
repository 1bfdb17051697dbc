//! Observer notifications emitted by the session.

use crate::entities::{Archive, Connection, Stream};
use crate::errors::SessionError;
use common::types::{ArchiveId, ConnectionId, StreamId};

/// Details of a mute-forced notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuteForcedInfo {
    /// `true` when force-mute became active, `false` when it was disabled.
    pub active: bool,
}

/// Notification delivered to every registered observer, in processing order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The session connected; carries the local connection.
    Connected { connection: Connection },
    /// The session disconnected. Emitted exactly once per session lifetime.
    Disconnected,
    /// An asynchronous error. `fatal` is `true` when the session moved to
    /// `Failed`.
    Failed { error: SessionError, fatal: bool },
    /// The network dropped and the transport is recovering.
    Reconnecting,
    /// The transport recovered; queued signals have been flushed.
    Reconnected,
    /// A stream was added to the session.
    StreamCreated(Stream),
    /// A stream left the session.
    StreamDestroyed(Stream),
    /// An existing stream's audio muted flag changed.
    StreamAudioMuted { stream_id: StreamId, muted: bool },
    /// A participant joined.
    ConnectionCreated(Connection),
    /// A participant left.
    ConnectionDestroyed(Connection),
    /// A signal arrived. `from` is `None` for server-originated signals.
    SignalReceived {
        signal_type: String,
        payload: String,
        from: Option<ConnectionId>,
    },
    /// Recording started.
    ArchiveStarted(Archive),
    /// Recording stopped.
    ArchiveStopped { archive_id: ArchiveId },
    /// Force-mute was activated or deactivated for the session.
    MuteForced(MuteForcedInfo),
}

impl SessionEvent {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Connected { .. } => "connected",
            SessionEvent::Disconnected => "disconnected",
            SessionEvent::Failed { .. } => "failed",
            SessionEvent::Reconnecting => "reconnecting",
            SessionEvent::Reconnected => "reconnected",
            SessionEvent::StreamCreated(_) => "stream_created",
            SessionEvent::StreamDestroyed(_) => "stream_destroyed",
            SessionEvent::StreamAudioMuted { .. } => "stream_audio_muted",
            SessionEvent::ConnectionCreated(_) => "connection_created",
            SessionEvent::ConnectionDestroyed(_) => "connection_destroyed",
            SessionEvent::SignalReceived { .. } => "signal_received",
            SessionEvent::ArchiveStarted(_) => "archive_started",
            SessionEvent::ArchiveStopped { .. } => "archive_stopped",
            SessionEvent::MuteForced(_) => "mute_forced",
        }
    }
}
