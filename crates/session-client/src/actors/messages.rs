//! Message types for the session actor.
//!
//! Caller intents carry a `oneshot` reply with the synchronous result.
//! Transport events are fire-and-forget.

use crate::capabilities::Capabilities;
use crate::entities::{Archive, Connection, Publisher, Stream, Subscriber};
use crate::errors::SessionError;
use crate::events::SessionEvent;
use crate::ice::IcePolicy;
use crate::moderation::ForceMuteState;
use crate::state::ConnectionStatus;
use crate::transport::TransportEvent;
use common::secret::SecretString;
use common::types::{ConnectionId, PublisherId, SessionId, StreamId, SubscriberId};
use tokio::sync::{mpsc, oneshot};

/// Reply channel for intent calls.
pub type Reply = oneshot::Sender<Result<(), SessionError>>;

/// Messages sent to `SessionActor`.
#[derive(Debug)]
pub enum SessionMessage {
    /// Open the network session with a credential.
    Connect {
        credential: SecretString,
        respond_to: Reply,
    },

    /// Close the network session.
    Disconnect { respond_to: Reply },

    /// Start publishing.
    Publish {
        publisher: Publisher,
        respond_to: Reply,
    },

    /// Stop publishing.
    Unpublish {
        publisher_id: PublisherId,
        respond_to: Reply,
    },

    /// Start receiving a stream.
    Subscribe {
        subscriber: Subscriber,
        respond_to: Reply,
    },

    /// Stop receiving a stream.
    Unsubscribe {
        subscriber_id: SubscriberId,
        respond_to: Reply,
    },

    /// Send an application signal.
    Signal {
        signal_type: String,
        payload: String,
        destination: Option<ConnectionId>,
        retry_after_reconnect: bool,
        respond_to: Reply,
    },

    /// Force every stream (minus exclusions) to mute audio.
    ForceMuteAll {
        excluded: Option<Vec<StreamId>>,
        respond_to: Reply,
    },

    /// Force one stream to mute audio.
    ForceMuteStream {
        stream_id: StreamId,
        respond_to: Reply,
    },

    /// Clear the session force-mute state.
    DisableForceMute { respond_to: Reply },

    /// Add a custom TURN server for the next connect.
    AddTurnServer {
        turn_url: String,
        username: String,
        credential: SecretString,
        respond_to: Reply,
    },

    /// Replace the ICE candidate policy for the next connect.
    UpdateIcePolicy {
        policy: IcePolicy,
        respond_to: Reply,
    },

    /// Set the end-to-end encryption secret.
    SetEncryptionSecret {
        secret: SecretString,
        respond_to: Reply,
    },

    /// Register an observer.
    SubscribeEvents {
        respond_to: oneshot::Sender<mpsc::UnboundedReceiver<SessionEvent>>,
    },

    /// Snapshot the session state.
    GetState {
        respond_to: oneshot::Sender<SessionState>,
    },

    /// Event reported by the transport for the network session opened by
    /// connect attempt `generation`.
    Transport {
        generation: u64,
        event: TransportEvent,
    },
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Session identifier.
    pub session_id: SessionId,
    /// Connection status.
    pub status: ConnectionStatus,
    /// Local connection, set once connected.
    pub local_connection: Option<Connection>,
    /// Granted capabilities, set once connected.
    pub capabilities: Option<Capabilities>,
    /// Registered streams, sorted by stream ID.
    pub streams: Vec<Stream>,
    /// Registered connections, sorted by connection ID.
    pub connections: Vec<Connection>,
    /// Session force-mute state.
    pub force_mute: ForceMuteState,
    /// Recording in progress, if any.
    pub active_archive: Option<Archive>,
    /// Signals waiting for reconnect.
    pub pending_signals: usize,
    /// Publishers owned by this client.
    pub publishers: Vec<PublisherId>,
    /// Subscribers owned by this client.
    pub subscribers: Vec<SubscriberId>,
}

impl SessionState {
    /// Whether a stream is registered.
    #[must_use]
    pub fn has_stream(&self, stream_id: &str) -> bool {
        self.streams.iter().any(|s| s.stream_id.as_str() == stream_id)
    }

    /// Look up a registered stream.
    #[must_use]
    pub fn stream(&self, stream_id: &str) -> Option<&Stream> {
        self.streams.iter().find(|s| s.stream_id.as_str() == stream_id)
    }
}
