//! Transport collaborator boundary.
//!
//! The [`Transport`] owns the network session and media engine. The session
//! actor hands requests to it and returns immediately; results come back later
//! as [`TransportEvent`]s pushed through the [`TransportReporter`] supplied in
//! the [`ConnectRequest`]. A `Transport` must never report an event from inside
//! one of its own methods while awaiting the reporter; spawn a task instead.
//!
//! Reconnect timing and network retries are the transport's job. The session
//! layer never retries a failed connect.

pub mod loopback;
pub mod mock;

use crate::actors::messages::SessionMessage;
use crate::capabilities::Capabilities;
use crate::config::SessionSettings;
use crate::entities::{Archive, Connection, Publisher, Stream, Subscriber};
use crate::errors::{SessionError, TransportError};
use crate::ice::IceConfig;
use common::secret::SecretString;
use common::types::{
    ArchiveId, ConnectionId, PublisherId, SessionId, StreamId, SubscriberId,
};
use tokio::sync::mpsc;

pub use crate::signal::OutboundSignal;

/// Everything the transport needs to open a network session.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Session to join.
    pub session_id: SessionId,
    /// Application key the session belongs to.
    pub api_key: String,
    /// Validated session credential.
    pub credential: SecretString,
    /// ICE configuration snapshot taken at connect time.
    pub ice: IceConfig,
    /// Connection settings.
    pub settings: SessionSettings,
    /// End-to-end encryption secret, if set.
    pub encryption_secret: Option<SecretString>,
    /// Where to report events for this network session.
    pub reporter: TransportReporter,
}

/// A publish hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Publisher to start.
    pub publisher: Publisher,
    /// Start with audio muted (session force-mute is active).
    pub start_audio_muted: bool,
}

/// Network session and media engine operations.
///
/// Every method is a non-blocking hand-off: `Ok` means the request was
/// accepted, not that it completed.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Open the network session.
    async fn connect(&self, request: ConnectRequest) -> Result<(), TransportError>;

    /// Close the network session. Completion is reported as
    /// [`TransportEvent::Disconnected`].
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Start publishing.
    async fn publish(&self, request: PublishRequest) -> Result<(), TransportError>;

    /// Stop publishing.
    async fn unpublish(&self, publisher_id: &PublisherId) -> Result<(), TransportError>;

    /// Start receiving a stream.
    async fn subscribe(&self, subscriber: &Subscriber) -> Result<(), TransportError>;

    /// Stop receiving a stream.
    async fn unsubscribe(&self, subscriber_id: &SubscriberId) -> Result<(), TransportError>;

    /// Send an application signal.
    async fn send_signal(&self, signal: &OutboundSignal) -> Result<(), TransportError>;

    /// Broadcast a mute-all command. `None` excludes nothing.
    async fn force_mute_all(&self, excluded: Option<&[StreamId]>) -> Result<(), TransportError>;

    /// Ask one stream's publisher to mute audio.
    async fn force_mute_stream(&self, stream_id: &StreamId) -> Result<(), TransportError>;

    /// Broadcast that force-mute is no longer active.
    async fn disable_force_mute(&self) -> Result<(), TransportError>;

    /// Replace the end-to-end encryption secret of the live session.
    async fn set_encryption_secret(&self, secret: &SecretString) -> Result<(), TransportError>;
}

/// Asynchronous events produced by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Network session established.
    Connected {
        connection: Connection,
        capabilities: Capabilities,
    },
    /// Connect attempt failed.
    ConnectFailed { reason: String },
    /// Network session closed.
    Disconnected,
    /// Network lost, recovery in progress.
    Reconnecting,
    /// Network recovered.
    Reconnected,
    /// A stream was added.
    StreamCreated(Stream),
    /// A stream was removed.
    StreamDestroyed(StreamId),
    /// A stream's audio was muted or unmuted.
    StreamAudioMuted { stream_id: StreamId, muted: bool },
    /// A participant joined.
    ConnectionCreated(Connection),
    /// A participant left.
    ConnectionDestroyed(ConnectionId),
    /// A signal arrived.
    SignalReceived {
        signal_type: String,
        payload: String,
        from: Option<ConnectionId>,
    },
    /// Force-mute was switched on or off for the session.
    MuteForced {
        active: bool,
        excluded: Option<Vec<StreamId>>,
    },
    /// Recording started.
    ArchiveStarted(Archive),
    /// Recording stopped.
    ArchiveStopped(ArchiveId),
    /// Unrecoverable transport error.
    FatalError { reason: String },
}

impl TransportEvent {
    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            TransportEvent::Connected { .. } => "connected",
            TransportEvent::ConnectFailed { .. } => "connect_failed",
            TransportEvent::Disconnected => "disconnected",
            TransportEvent::Reconnecting => "reconnecting",
            TransportEvent::Reconnected => "reconnected",
            TransportEvent::StreamCreated(_) => "stream_created",
            TransportEvent::StreamDestroyed(_) => "stream_destroyed",
            TransportEvent::StreamAudioMuted { .. } => "stream_audio_muted",
            TransportEvent::ConnectionCreated(_) => "connection_created",
            TransportEvent::ConnectionDestroyed(_) => "connection_destroyed",
            TransportEvent::SignalReceived { .. } => "signal_received",
            TransportEvent::MuteForced { .. } => "mute_forced",
            TransportEvent::ArchiveStarted(_) => "archive_started",
            TransportEvent::ArchiveStopped(_) => "archive_stopped",
            TransportEvent::FatalError { .. } => "fatal_error",
        }
    }
}

/// Pushes transport events into the session's mailbox.
///
/// Events share the mailbox with caller intents, so they are applied in the
/// same serialized order as everything else. The reporter holds a weak
/// sender: a transport keeping a reporter does not keep the session alive.
///
/// Each reporter is bound to the connect attempt that created it. Once the
/// session has started another connect, events from older reporters are
/// discarded.
#[derive(Debug, Clone)]
pub struct TransportReporter {
    sender: mpsc::WeakSender<SessionMessage>,
    generation: u64,
}

impl TransportReporter {
    pub(crate) fn new(sender: mpsc::WeakSender<SessionMessage>, generation: u64) -> Self {
        Self { sender, generation }
    }

    /// Connect attempt this reporter belongs to.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver an event.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report(&self, event: TransportEvent) -> Result<(), SessionError> {
        let Some(sender) = self.sender.upgrade() else {
            return Err(SessionError::Internal("session released".to_string()));
        };
        sender
            .send(SessionMessage::Transport {
                generation: self.generation,
                event,
            })
            .await
            .map_err(|e| SessionError::Internal(format!("channel send failed: {e}")))
    }

    /// Whether the session behind this reporter has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender
            .upgrade()
            .map_or(true, |sender| sender.is_closed())
    }

    /// Network session established with the given local connection.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_connected(
        &self,
        connection: Connection,
        capabilities: Capabilities,
    ) -> Result<(), SessionError> {
        self.report(TransportEvent::Connected {
            connection,
            capabilities,
        })
        .await
    }

    /// Connect attempt failed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_connect_failed(&self, reason: impl Into<String>) -> Result<(), SessionError> {
        self.report(TransportEvent::ConnectFailed {
            reason: reason.into(),
        })
        .await
    }

    /// Network session closed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_disconnected(&self) -> Result<(), SessionError> {
        self.report(TransportEvent::Disconnected).await
    }

    /// Network lost, recovery in progress.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_reconnecting(&self) -> Result<(), SessionError> {
        self.report(TransportEvent::Reconnecting).await
    }

    /// Network recovered.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_reconnected(&self) -> Result<(), SessionError> {
        self.report(TransportEvent::Reconnected).await
    }

    /// A stream was added to the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_stream_created(&self, stream: Stream) -> Result<(), SessionError> {
        self.report(TransportEvent::StreamCreated(stream)).await
    }

    /// A stream was removed from the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_stream_destroyed(
        &self,
        stream_id: impl Into<StreamId>,
    ) -> Result<(), SessionError> {
        self.report(TransportEvent::StreamDestroyed(stream_id.into()))
            .await
    }

    /// A stream's audio muted flag changed.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_stream_audio_muted(
        &self,
        stream_id: impl Into<StreamId>,
        muted: bool,
    ) -> Result<(), SessionError> {
        self.report(TransportEvent::StreamAudioMuted {
            stream_id: stream_id.into(),
            muted,
        })
        .await
    }

    /// A participant joined.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_connection_created(
        &self,
        connection: Connection,
    ) -> Result<(), SessionError> {
        self.report(TransportEvent::ConnectionCreated(connection))
            .await
    }

    /// A participant left.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_connection_destroyed(
        &self,
        connection_id: impl Into<ConnectionId>,
    ) -> Result<(), SessionError> {
        self.report(TransportEvent::ConnectionDestroyed(connection_id.into()))
            .await
    }

    /// A signal arrived. `from` is `None` for server-originated signals.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_signal_received(
        &self,
        signal_type: impl Into<String>,
        payload: impl Into<String>,
        from: Option<ConnectionId>,
    ) -> Result<(), SessionError> {
        self.report(TransportEvent::SignalReceived {
            signal_type: signal_type.into(),
            payload: payload.into(),
            from,
        })
        .await
    }

    /// Force-mute was switched on or off.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_mute_forced(
        &self,
        active: bool,
        excluded: Option<Vec<StreamId>>,
    ) -> Result<(), SessionError> {
        self.report(TransportEvent::MuteForced { active, excluded })
            .await
    }

    /// Recording started.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_archive_started(
        &self,
        archive_id: impl Into<ArchiveId>,
        name: Option<String>,
    ) -> Result<(), SessionError> {
        self.report(TransportEvent::ArchiveStarted(Archive {
            archive_id: archive_id.into(),
            name,
        }))
        .await
    }

    /// Recording stopped.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_archive_stopped(
        &self,
        archive_id: impl Into<ArchiveId>,
    ) -> Result<(), SessionError> {
        self.report(TransportEvent::ArchiveStopped(archive_id.into()))
            .await
    }

    /// Unrecoverable transport error.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Internal`] if the session has been released.
    pub async fn report_fatal_error(&self, reason: impl Into<String>) -> Result<(), SessionError> {
        self.report(TransportEvent::FatalError {
            reason: reason.into(),
        })
        .await
    }
}
