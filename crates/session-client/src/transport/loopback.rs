//! In-memory transport that plays the server side for a single client.
//!
//! Connects immediately, turns publishes into stream-created events, loops
//! signals back to the sender and broadcasts mute commands to itself. Events
//! go through one forwarding task per network session so they reach the
//! session in the order they were produced.

use super::{
    ConnectRequest, OutboundSignal, PublishRequest, Transport, TransportEvent, TransportReporter,
};
use crate::capabilities::{Capabilities, Role};
use crate::entities::{Connection, Stream, Subscriber};
use crate::errors::TransportError;
use common::secret::SecretString;
use common::types::{ConnectionId, PublisherId, StreamId, SubscriberId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
struct LoopbackState {
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    local_connection: Option<ConnectionId>,
    streams: HashMap<PublisherId, StreamId>,
}

/// Loopback transport used by the demo binary and tests.
#[derive(Debug)]
pub struct LoopbackTransport {
    capabilities: Capabilities,
    state: Mutex<LoopbackState>,
}

impl LoopbackTransport {
    /// Create a loopback transport that grants the given role on connect.
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self {
            capabilities: Capabilities::for_role(role),
            state: Mutex::new(LoopbackState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(state: &LoopbackState, event: TransportEvent) -> Result<(), TransportError> {
        let Some(events) = &state.events else {
            return Err(TransportError::Unavailable(
                "no network session".to_string(),
            ));
        };
        events
            .send(event)
            .map_err(|_| TransportError::Unavailable("network session closed".to_string()))
    }
}

async fn forward_events(
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    reporter: TransportReporter,
) {
    while let Some(event) = events.recv().await {
        let kind = event.kind();
        if reporter.report(event).await.is_err() {
            debug!(
                target: "session.transport",
                event = kind,
                "Session released, loopback forwarder exiting"
            );
            return;
        }
    }
}

#[async_trait::async_trait]
impl Transport for LoopbackTransport {
    async fn connect(&self, request: ConnectRequest) -> Result<(), TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(forward_events(rx, request.reporter));

        let connection_id = ConnectionId::new(format!("loopback-{}", Uuid::new_v4()));
        let connection = Connection::new(connection_id.clone());

        let mut state = self.state();
        state.events = Some(tx);
        state.local_connection = Some(connection_id);
        state.streams.clear();

        debug!(
            target: "session.transport",
            session_id = %request.session_id,
            "Loopback session opened"
        );

        Self::emit(
            &state,
            TransportEvent::Connected {
                connection,
                capabilities: self.capabilities,
            },
        )
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state();
        let result = Self::emit(&state, TransportEvent::Disconnected);
        // Dropping the sender ends the forwarder after the last event.
        state.events = None;
        state.local_connection = None;
        state.streams.clear();
        result
    }

    async fn publish(&self, request: PublishRequest) -> Result<(), TransportError> {
        let mut state = self.state();
        let Some(connection_id) = state.local_connection.clone() else {
            return Err(TransportError::Unavailable(
                "no network session".to_string(),
            ));
        };

        let publisher = request.publisher;
        let stream_id = StreamId::new(format!("stream-{}", publisher.publisher_id));
        let mut stream = Stream::new(stream_id.clone(), connection_id);
        stream.name = publisher.name;
        stream.has_audio = publisher.publish_audio;
        stream.has_video = publisher.publish_video;
        stream.video_type = publisher.video_type;
        stream.audio_muted = request.start_audio_muted;

        state.streams.insert(publisher.publisher_id, stream_id);
        Self::emit(&state, TransportEvent::StreamCreated(stream))
    }

    async fn unpublish(&self, publisher_id: &PublisherId) -> Result<(), TransportError> {
        let mut state = self.state();
        match state.streams.remove(publisher_id) {
            Some(stream_id) => Self::emit(&state, TransportEvent::StreamDestroyed(stream_id)),
            None => {
                warn!(
                    target: "session.transport",
                    publisher_id = %publisher_id,
                    "Unpublish for unknown publisher"
                );
                Ok(())
            }
        }
    }

    async fn subscribe(&self, subscriber: &Subscriber) -> Result<(), TransportError> {
        debug!(
            target: "session.transport",
            subscriber_id = %subscriber.subscriber_id,
            stream_id = %subscriber.stream_id,
            "Loopback subscribe"
        );
        Ok(())
    }

    async fn unsubscribe(&self, _subscriber_id: &SubscriberId) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_signal(&self, signal: &OutboundSignal) -> Result<(), TransportError> {
        let state = self.state();
        let from = state.local_connection.clone();

        // Directed signals only loop back when addressed to ourselves.
        if let Some(destination) = &signal.destination {
            if from.as_ref() != Some(destination) {
                return Ok(());
            }
        }

        Self::emit(
            &state,
            TransportEvent::SignalReceived {
                signal_type: signal.signal_type.clone(),
                payload: signal.payload.clone(),
                from,
            },
        )
    }

    async fn force_mute_all(&self, excluded: Option<&[StreamId]>) -> Result<(), TransportError> {
        let state = self.state();
        Self::emit(
            &state,
            TransportEvent::MuteForced {
                active: true,
                excluded: excluded.map(<[StreamId]>::to_vec),
            },
        )?;

        let excluded = excluded.unwrap_or_default();
        for stream_id in state.streams.values() {
            if !excluded.contains(stream_id) {
                Self::emit(
                    &state,
                    TransportEvent::StreamAudioMuted {
                        stream_id: stream_id.clone(),
                        muted: true,
                    },
                )?;
            }
        }
        Ok(())
    }

    async fn force_mute_stream(&self, stream_id: &StreamId) -> Result<(), TransportError> {
        let state = self.state();
        if state.streams.values().any(|id| id == stream_id) {
            Self::emit(
                &state,
                TransportEvent::StreamAudioMuted {
                    stream_id: stream_id.clone(),
                    muted: true,
                },
            )?;
        }
        Ok(())
    }

    async fn disable_force_mute(&self) -> Result<(), TransportError> {
        let state = self.state();
        Self::emit(
            &state,
            TransportEvent::MuteForced {
                active: false,
                excluded: None,
            },
        )
    }

    async fn set_encryption_secret(&self, _secret: &SecretString) -> Result<(), TransportError> {
        debug!(target: "session.transport", "Loopback encryption secret updated");
        Ok(())
    }
}
