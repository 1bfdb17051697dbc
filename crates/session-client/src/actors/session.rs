//! `SessionActor` - owns all state of one session.
//!
//! Every intent call either fails synchronously (invalid argument, wrong
//! status, missing capability) or is handed to the transport and answered
//! with `Ok` straight away. A hand-off the transport refuses is reported
//! once, asynchronously, as [`SessionEvent::Failed`]; it is never also
//! returned to the caller.
//!
//! # Disconnect
//!
//! `disconnect` moves to `Disconnecting`, tears down every owned publisher
//! and subscriber without waiting for their stream-destroyed confirmations,
//! discards queued signals and asks the transport to close. The session
//! reaches `NotConnected` when the transport reports the closure. Stream
//! events arriving after that are ignored.

use super::messages::{Reply, SessionMessage, SessionState};
use super::metrics::MailboxMonitor;
use crate::capabilities::{Capabilities, CapabilityGate};
use crate::config::{Config, SessionSettings};
use crate::credential::validate_credential;
use crate::entities::{Archive, Connection, Publisher, Stream, Subscriber};
use crate::errors::{InvalidArgumentError, SessionError, TransportError};
use crate::events::{MuteForcedInfo, SessionEvent};
use crate::ice::{IceConfig, IcePolicy};
use crate::moderation::ModerationController;
use crate::observability::{self, SessionGauges};
use crate::registry::EntityRegistry;
use crate::signal::{OutboundSignal, SignalDispatcher, SignalRoute};
use crate::state::ConnectionStatus;
use crate::transport::{
    ConnectRequest, PublishRequest, Transport, TransportEvent, TransportReporter,
};
use common::secret::{ExposeSecret, SecretString};
use common::types::{ArchiveId, ConnectionId, PublisherId, SessionId, StreamId, SubscriberId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Accepted end-to-end encryption secret length, in characters.
const ENCRYPTION_SECRET_LENGTH: std::ops::RangeInclusive<usize> = 8..=256;

/// Handle to a `SessionActor`.
///
/// Cheap to clone; every clone talks to the same session.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
    session_id: SessionId,
}

impl SessionHandle {
    /// Session identifier.
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    async fn request(
        &self,
        build: impl FnOnce(Reply) -> SessionMessage,
    ) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| SessionError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SessionError::Internal(format!("response receive failed: {e}")))?
    }

    /// Connect to the session.
    ///
    /// Only valid from `NotConnected`. The credential is validated locally;
    /// the outcome of the network connect arrives as
    /// [`SessionEvent::Connected`] or [`SessionEvent::Failed`].
    ///
    /// # Errors
    ///
    /// - `NotConnected` if the session is not in `NotConnected`
    /// - `InvalidArgument(MalformedCredential)` for a malformed credential
    pub async fn connect(&self, credential: impl Into<String>) -> Result<(), SessionError> {
        let credential = SecretString::from(credential.into());
        self.request(|respond_to| SessionMessage::Connect {
            credential,
            respond_to,
        })
        .await
    }

    /// Disconnect from the session.
    ///
    /// # Errors
    ///
    /// `NotConnected` unless `Connecting`, `Connected` or `Reconnecting`.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::Disconnect { respond_to })
            .await
    }

    /// Start publishing.
    ///
    /// # Errors
    ///
    /// - `NotConnected` unless `Connected` or `Reconnecting`
    /// - `PermissionDenied` without the publish capability
    /// - `InvalidArgument(DuplicatePublisher)` if already publishing
    pub async fn publish(&self, publisher: Publisher) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::Publish {
            publisher,
            respond_to,
        })
        .await
    }

    /// Stop publishing.
    ///
    /// # Errors
    ///
    /// - `NotConnected` unless `Connected` or `Reconnecting`
    /// - `InvalidArgument(UnknownPublisher)` if not publishing
    pub async fn unpublish(&self, publisher_id: PublisherId) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::Unpublish {
            publisher_id,
            respond_to,
        })
        .await
    }

    /// Start receiving a registered stream.
    ///
    /// # Errors
    ///
    /// - `NotConnected` unless `Connected` or `Reconnecting`
    /// - `PermissionDenied` without the subscribe capability
    /// - `InvalidArgument(UnknownStream)` if the stream is not registered
    /// - `InvalidArgument(DuplicateSubscriber)` if already subscribed
    pub async fn subscribe(&self, subscriber: Subscriber) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::Subscribe {
            subscriber,
            respond_to,
        })
        .await
    }

    /// Stop receiving a stream.
    ///
    /// # Errors
    ///
    /// - `NotConnected` unless `Connected` or `Reconnecting`
    /// - `InvalidArgument(UnknownSubscriber)` if not subscribed
    pub async fn unsubscribe(&self, subscriber_id: SubscriberId) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::Unsubscribe {
            subscriber_id,
            respond_to,
        })
        .await
    }

    /// Send a signal to every participant (`destination = None`) or one
    /// connection.
    ///
    /// While reconnecting the signal is queued when `retry_after_reconnect`
    /// is set and silently dropped otherwise.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an invalid type or oversized payload
    /// - `NotConnected` unless `Connected` or `Reconnecting`
    pub async fn signal(
        &self,
        signal_type: impl Into<String>,
        payload: impl Into<String>,
        destination: Option<ConnectionId>,
        retry_after_reconnect: bool,
    ) -> Result<(), SessionError> {
        let signal_type = signal_type.into();
        let payload = payload.into();
        self.request(|respond_to| SessionMessage::Signal {
            signal_type,
            payload,
            destination,
            retry_after_reconnect,
            respond_to,
        })
        .await
    }

    /// Force every stream except `excluded` to mute audio, and mute new
    /// streams until [`disable_force_mute`](Self::disable_force_mute).
    /// `None` includes the local client's own streams.
    ///
    /// # Errors
    ///
    /// - `NotConnected` unless `Connected` or `Reconnecting`
    /// - `PermissionDenied` without the force-mute capability
    pub async fn force_mute_all(&self, excluded: Option<Vec<StreamId>>) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::ForceMuteAll {
            excluded,
            respond_to,
        })
        .await
    }

    /// Force one stream to mute audio.
    ///
    /// # Errors
    ///
    /// - `NotConnected` unless `Connected` or `Reconnecting`
    /// - `PermissionDenied` without the force-mute capability
    /// - `InvalidArgument(UnknownStream)` if the stream is not registered
    pub async fn force_mute_stream(&self, stream_id: StreamId) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::ForceMuteStream {
            stream_id,
            respond_to,
        })
        .await
    }

    /// Clear the session force-mute state. Already muted streams stay muted.
    ///
    /// # Errors
    ///
    /// - `NotConnected` unless `Connected` or `Reconnecting`
    /// - `PermissionDenied` without the force-mute capability
    pub async fn disable_force_mute(&self) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::DisableForceMute { respond_to })
            .await
    }

    /// Add a custom TURN server. Takes effect on the next connect.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an invalid URL, empty credentials, or a full
    /// server list (checked in that order).
    pub async fn add_turn_server(
        &self,
        turn_url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Result<(), SessionError> {
        let turn_url = turn_url.into();
        let username = username.into();
        let credential = SecretString::from(credential.into());
        self.request(|respond_to| SessionMessage::AddTurnServer {
            turn_url,
            username,
            credential,
            respond_to,
        })
        .await
    }

    /// Replace the ICE candidate policy. Takes effect on the next connect.
    ///
    /// # Errors
    ///
    /// `Internal` if the session has been released.
    pub async fn update_ice_policy(&self, policy: IcePolicy) -> Result<(), SessionError> {
        self.request(|respond_to| SessionMessage::UpdateIcePolicy { policy, respond_to })
            .await
    }

    /// Set the end-to-end encryption secret.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument(InvalidEncryptionSecret)` unless 8 to 256 characters
    /// - `NotConnected` once the session has failed
    pub async fn set_encryption_secret(&self, secret: impl Into<String>) -> Result<(), SessionError> {
        let secret = SecretString::from(secret.into());
        self.request(|respond_to| SessionMessage::SetEncryptionSecret { secret, respond_to })
            .await
    }

    /// Register an observer. Events are delivered in processing order.
    ///
    /// # Errors
    ///
    /// `Internal` if the session has been released.
    pub async fn subscribe_events(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<SessionEvent>, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::SubscribeEvents { respond_to: tx })
            .await
            .map_err(|e| SessionError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SessionError::Internal(format!("response receive failed: {e}")))
    }

    /// Snapshot the session state.
    ///
    /// # Errors
    ///
    /// `Internal` if the session has been released.
    pub async fn get_state(&self) -> Result<SessionState, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::GetState { respond_to: tx })
            .await
            .map_err(|e| SessionError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| SessionError::Internal(format!("response receive failed: {e}")))
    }

    /// Release the session.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Whether the session has been released.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// The `SessionActor` implementation.
pub struct SessionActor {
    session_id: SessionId,
    api_key: String,
    settings: SessionSettings,
    receiver: mpsc::Receiver<SessionMessage>,
    /// Weak so that reporters handed to the transport never keep the
    /// mailbox open.
    weak_sender: mpsc::WeakSender<SessionMessage>,
    cancel_token: CancellationToken,
    transport: Arc<dyn Transport>,
    status: ConnectionStatus,
    /// Bumped on every accepted connect; tags the reporter handed out.
    generation: u64,
    ice: IceConfig,
    encryption_secret: Option<SecretString>,
    capabilities: CapabilityGate,
    registry: EntityRegistry,
    signals: SignalDispatcher,
    moderation: ModerationController,
    local_connection: Option<Connection>,
    publishers: HashMap<PublisherId, Publisher>,
    subscribers: HashMap<SubscriberId, Subscriber>,
    active_archive: Option<Archive>,
    observers: Vec<mpsc::UnboundedSender<SessionEvent>>,
    reconnecting_since: Option<Instant>,
    mailbox: MailboxMonitor,
    gauges: SessionGauges,
}

impl SessionActor {
    /// Spawn a new session actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        config: &Config,
        transport: Arc<dyn Transport>,
        cancel_token: CancellationToken,
    ) -> (SessionHandle, JoinHandle<()>) {
        let capacity = config.mailbox_capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);

        let actor = Self {
            session_id: config.session_id.clone(),
            api_key: config.api_key.clone(),
            settings: config.settings.clone(),
            receiver,
            weak_sender: sender.downgrade(),
            cancel_token: cancel_token.clone(),
            transport,
            status: ConnectionStatus::NotConnected,
            generation: 0,
            ice: IceConfig::new(config.max_turn_servers),
            encryption_secret: None,
            capabilities: CapabilityGate::new(),
            registry: EntityRegistry::new(),
            signals: SignalDispatcher::new(
                config.signal_max_type_length,
                config.signal_max_payload_bytes,
            ),
            moderation: ModerationController::new(),
            local_connection: None,
            publishers: HashMap::new(),
            subscribers: HashMap::new(),
            active_archive: None,
            observers: Vec::new(),
            reconnecting_since: None,
            mailbox: MailboxMonitor::new(config.session_id.as_str(), capacity),
            gauges: SessionGauges::new(),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = SessionHandle {
            sender,
            cancel_token,
            session_id: config.session_id.clone(),
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "session.actor", fields(session_id = %self.session_id))]
    async fn run(mut self) {
        info!(
            target: "session.actor",
            session_id = %self.session_id,
            "SessionActor started"
        );

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "session.actor",
                        session_id = %self.session_id,
                        "SessionActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_backlog(self.receiver.len() + 1);
                            self.handle_message(message).await;
                            self.mailbox.record_processed();
                        }
                        None => {
                            info!(
                                target: "session.actor",
                                session_id = %self.session_id,
                                "All session handles dropped, releasing"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.graceful_shutdown().await;

        info!(
            target: "session.actor",
            session_id = %self.session_id,
            messages_processed = self.mailbox.messages_processed(),
            "SessionActor stopped"
        );
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Connect {
                credential,
                respond_to,
            } => {
                let result = self.handle_connect(credential).await;
                respond("connect", result, respond_to);
            }

            SessionMessage::Disconnect { respond_to } => {
                let result = self.handle_disconnect().await;
                respond("disconnect", result, respond_to);
            }

            SessionMessage::Publish {
                publisher,
                respond_to,
            } => {
                let result = self.handle_publish(publisher).await;
                respond("publish", result, respond_to);
            }

            SessionMessage::Unpublish {
                publisher_id,
                respond_to,
            } => {
                let result = self.handle_unpublish(&publisher_id).await;
                respond("unpublish", result, respond_to);
            }

            SessionMessage::Subscribe {
                subscriber,
                respond_to,
            } => {
                let result = self.handle_subscribe(subscriber).await;
                respond("subscribe", result, respond_to);
            }

            SessionMessage::Unsubscribe {
                subscriber_id,
                respond_to,
            } => {
                let result = self.handle_unsubscribe(&subscriber_id).await;
                respond("unsubscribe", result, respond_to);
            }

            SessionMessage::Signal {
                signal_type,
                payload,
                destination,
                retry_after_reconnect,
                respond_to,
            } => {
                let signal = OutboundSignal {
                    signal_type,
                    payload,
                    destination,
                };
                let result = self.handle_signal(signal, retry_after_reconnect).await;
                if result.is_err() {
                    observability::record_signal("rejected");
                }
                respond("signal", result, respond_to);
            }

            SessionMessage::ForceMuteAll {
                excluded,
                respond_to,
            } => {
                let result = self.handle_force_mute_all(excluded).await;
                respond("force_mute_all", result, respond_to);
            }

            SessionMessage::ForceMuteStream {
                stream_id,
                respond_to,
            } => {
                let result = self.handle_force_mute_stream(&stream_id).await;
                respond("force_mute_stream", result, respond_to);
            }

            SessionMessage::DisableForceMute { respond_to } => {
                let result = self.handle_disable_force_mute().await;
                respond("disable_force_mute", result, respond_to);
            }

            SessionMessage::AddTurnServer {
                turn_url,
                username,
                credential,
                respond_to,
            } => {
                let result = self
                    .ice
                    .add_turn_server(&turn_url, &username, credential.expose_secret())
                    .map_err(SessionError::from);
                respond("add_turn_server", result, respond_to);
            }

            SessionMessage::UpdateIcePolicy { policy, respond_to } => {
                self.ice.set_policy(policy);
                debug!(target: "session.ice", ?policy, "ICE policy updated");
                respond("update_ice_policy", Ok(()), respond_to);
            }

            SessionMessage::SetEncryptionSecret { secret, respond_to } => {
                let result = self.handle_set_encryption_secret(secret).await;
                respond("set_encryption_secret", result, respond_to);
            }

            SessionMessage::SubscribeEvents { respond_to } => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.observers.push(tx);
                let _ = respond_to.send(rx);
            }

            SessionMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.get_state());
            }

            SessionMessage::Transport { generation, event } => {
                self.handle_transport_event(generation, event).await;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Intent handlers
    // ------------------------------------------------------------------------

    #[instrument(skip_all, fields(session_id = %self.session_id))]
    async fn handle_connect(&mut self, credential: SecretString) -> Result<(), SessionError> {
        if self.status != ConnectionStatus::NotConnected {
            return Err(SessionError::NotConnected {
                status: self.status,
            });
        }

        validate_credential(&credential)?;

        self.transition(ConnectionStatus::Connecting);
        self.generation = self.generation.wrapping_add(1);

        let request = ConnectRequest {
            session_id: self.session_id.clone(),
            api_key: self.api_key.clone(),
            credential,
            ice: self.ice.clone(),
            settings: self.settings.clone(),
            encryption_secret: self.encryption_secret.clone(),
            reporter: TransportReporter::new(self.weak_sender.clone(), self.generation),
        };

        if let Err(e) = self.transport.connect(request).await {
            warn!(
                target: "session.actor",
                error = %e,
                "Transport refused connect"
            );
            self.fail_session(SessionError::from(e)).await;
        }

        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %self.session_id))]
    async fn handle_disconnect(&mut self) -> Result<(), SessionError> {
        if !self.status.has_network_session() {
            return Err(SessionError::NotConnected {
                status: self.status,
            });
        }

        self.transition(ConnectionStatus::Disconnecting);
        self.teardown_media().await;
        self.discard_pending_signals();

        if let Err(e) = self.transport.disconnect().await {
            // The transport will never confirm; finish locally.
            warn!(
                target: "session.actor",
                error = %e,
                "Transport refused disconnect, closing locally"
            );
            self.finish_disconnect();
        }

        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %self.session_id))]
    async fn handle_publish(&mut self, publisher: Publisher) -> Result<(), SessionError> {
        self.require_live()?;
        self.capabilities.require_publish()?;

        if self.publishers.contains_key(&publisher.publisher_id) {
            return Err(InvalidArgumentError::DuplicatePublisher.into());
        }

        let request = PublishRequest {
            publisher: publisher.clone(),
            start_audio_muted: self.moderation.is_active(),
        };

        match self.transport.publish(request).await {
            Ok(()) => {
                debug!(
                    target: "session.actor",
                    publisher_id = %publisher.publisher_id,
                    "Publish handed to transport"
                );
                self.publishers
                    .insert(publisher.publisher_id.clone(), publisher);
            }
            Err(e) => self.report_transport_failure("publish", e),
        }

        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %self.session_id))]
    async fn handle_unpublish(&mut self, publisher_id: &PublisherId) -> Result<(), SessionError> {
        self.require_live()?;

        if self.publishers.remove(publisher_id).is_none() {
            return Err(InvalidArgumentError::UnknownPublisher.into());
        }

        if let Err(e) = self.transport.unpublish(publisher_id).await {
            self.report_transport_failure("unpublish", e);
        }

        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %self.session_id))]
    async fn handle_subscribe(&mut self, subscriber: Subscriber) -> Result<(), SessionError> {
        self.require_live()?;
        self.capabilities.require_subscribe()?;

        if !self.registry.contains_stream(&subscriber.stream_id) {
            return Err(InvalidArgumentError::UnknownStream.into());
        }
        if self.subscribers.contains_key(&subscriber.subscriber_id) {
            return Err(InvalidArgumentError::DuplicateSubscriber.into());
        }

        match self.transport.subscribe(&subscriber).await {
            Ok(()) => {
                self.subscribers
                    .insert(subscriber.subscriber_id.clone(), subscriber);
            }
            Err(e) => self.report_transport_failure("subscribe", e),
        }

        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %self.session_id))]
    async fn handle_unsubscribe(
        &mut self,
        subscriber_id: &SubscriberId,
    ) -> Result<(), SessionError> {
        self.require_live()?;

        if self.subscribers.remove(subscriber_id).is_none() {
            return Err(InvalidArgumentError::UnknownSubscriber.into());
        }

        if let Err(e) = self.transport.unsubscribe(subscriber_id).await {
            self.report_transport_failure("unsubscribe", e);
        }

        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %self.session_id))]
    async fn handle_signal(
        &mut self,
        signal: OutboundSignal,
        retry_after_reconnect: bool,
    ) -> Result<(), SessionError> {
        self.signals
            .validate(&signal.signal_type, &signal.payload)?;

        match self
            .signals
            .route(signal, self.status, retry_after_reconnect)?
        {
            SignalRoute::SendNow(signal) => self.send_signal(&signal).await,
            SignalRoute::Queued => {
                observability::record_signal("queued");
                self.gauges.set_pending_signals(self.signals.pending_len());
            }
            SignalRoute::Dropped => observability::record_signal("dropped"),
        }

        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %self.session_id))]
    async fn handle_force_mute_all(
        &mut self,
        excluded: Option<Vec<StreamId>>,
    ) -> Result<(), SessionError> {
        self.require_live()?;
        self.capabilities.require_force_mute()?;

        match self.transport.force_mute_all(excluded.as_deref()).await {
            Ok(()) => {
                self.moderation.activate(excluded.as_deref());
                observability::record_force_mute("all");
            }
            Err(e) => self.report_transport_failure("force_mute_all", e),
        }

        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %self.session_id))]
    async fn handle_force_mute_stream(&mut self, stream_id: &StreamId) -> Result<(), SessionError> {
        self.require_live()?;
        self.capabilities.require_force_mute()?;

        if !self.registry.contains_stream(stream_id) {
            return Err(InvalidArgumentError::UnknownStream.into());
        }

        match self.transport.force_mute_stream(stream_id).await {
            Ok(()) => observability::record_force_mute("stream"),
            Err(e) => self.report_transport_failure("force_mute_stream", e),
        }

        Ok(())
    }

    #[instrument(skip_all, fields(session_id = %self.session_id))]
    async fn handle_disable_force_mute(&mut self) -> Result<(), SessionError> {
        self.require_live()?;
        self.capabilities.require_force_mute()?;

        match self.transport.disable_force_mute().await {
            Ok(()) => {
                self.moderation.deactivate();
                observability::record_force_mute("disable");
            }
            Err(e) => self.report_transport_failure("disable_force_mute", e),
        }

        Ok(())
    }

    async fn handle_set_encryption_secret(
        &mut self,
        secret: SecretString,
    ) -> Result<(), SessionError> {
        if !ENCRYPTION_SECRET_LENGTH.contains(&secret.expose_secret().chars().count()) {
            return Err(InvalidArgumentError::InvalidEncryptionSecret.into());
        }
        if self.status == ConnectionStatus::Failed {
            return Err(SessionError::NotConnected {
                status: self.status,
            });
        }

        if self.status.accepts_intents() {
            if let Err(e) = self.transport.set_encryption_secret(&secret).await {
                self.report_transport_failure("set_encryption_secret", e);
            }
        }
        self.encryption_secret = Some(secret);

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------------

    async fn handle_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.generation {
            debug!(
                target: "session.actor",
                event = event.kind(),
                generation,
                current = self.generation,
                "Event from a previous network session ignored"
            );
            return;
        }

        if matches!(
            self.status,
            ConnectionStatus::NotConnected | ConnectionStatus::Failed
        ) {
            debug!(
                target: "session.actor",
                event = event.kind(),
                status = %self.status,
                "Stale transport event ignored"
            );
            return;
        }

        match event {
            TransportEvent::Connected {
                connection,
                capabilities,
            } => self.on_connected(connection, capabilities),
            TransportEvent::ConnectFailed { reason } => {
                if self.status == ConnectionStatus::Connecting {
                    self.fail_session(SessionError::TransportFailure(reason))
                        .await;
                } else {
                    debug!(target: "session.actor", status = %self.status, "Connect failure ignored");
                }
            }
            TransportEvent::Disconnected => self.on_disconnected().await,
            TransportEvent::Reconnecting => self.on_reconnecting(),
            TransportEvent::Reconnected => self.on_reconnected().await,
            TransportEvent::StreamCreated(stream) => self.on_stream_created(stream),
            TransportEvent::StreamDestroyed(stream_id) => self.on_stream_destroyed(&stream_id),
            TransportEvent::StreamAudioMuted { stream_id, muted } => {
                if self
                    .registry
                    .set_stream_audio_muted(&stream_id, muted)
                    .is_some()
                {
                    self.emit(SessionEvent::StreamAudioMuted { stream_id, muted });
                }
            }
            TransportEvent::ConnectionCreated(connection) => {
                self.on_connection_created(connection);
            }
            TransportEvent::ConnectionDestroyed(connection_id) => {
                self.on_connection_destroyed(&connection_id);
            }
            TransportEvent::SignalReceived {
                signal_type,
                payload,
                from,
            } => {
                self.emit(SessionEvent::SignalReceived {
                    signal_type,
                    payload,
                    from,
                });
            }
            TransportEvent::MuteForced { active, excluded } => {
                self.moderation.apply_remote(active, excluded.as_deref());
                self.emit(SessionEvent::MuteForced(MuteForcedInfo { active }));
            }
            TransportEvent::ArchiveStarted(archive) => {
                self.active_archive = Some(archive.clone());
                self.emit(SessionEvent::ArchiveStarted(archive));
            }
            TransportEvent::ArchiveStopped(archive_id) => self.on_archive_stopped(archive_id),
            TransportEvent::FatalError { reason } => self.on_fatal_error(reason).await,
        }
    }

    fn on_connected(&mut self, connection: Connection, capabilities: Capabilities) {
        if self.status != ConnectionStatus::Connecting {
            debug!(
                target: "session.actor",
                status = %self.status,
                "Connected event outside Connecting ignored"
            );
            return;
        }

        self.capabilities.grant(capabilities);
        self.local_connection = Some(connection.clone());
        self.registry.upsert_connection(connection.clone());
        self.gauges.set_connections(self.registry.connection_count());

        self.transition(ConnectionStatus::Connected);
        info!(
            target: "session.actor",
            connection_id = %connection.connection_id,
            can_publish = capabilities.can_publish,
            can_subscribe = capabilities.can_subscribe,
            can_force_mute = capabilities.can_force_mute,
            "Session connected"
        );
        self.emit(SessionEvent::Connected { connection });
    }

    async fn on_disconnected(&mut self) {
        if self.status != ConnectionStatus::Disconnecting {
            // Not requested: the network session was lost for good.
            warn!(
                target: "session.actor",
                status = %self.status,
                "Network session dropped"
            );
            self.teardown_media().await;
            self.emit(SessionEvent::Failed {
                error: SessionError::TransportFailure("session dropped".to_string()),
                fatal: false,
            });
        }
        self.finish_disconnect();
    }

    fn on_reconnecting(&mut self) {
        if self.status != ConnectionStatus::Connected {
            debug!(target: "session.actor", status = %self.status, "Reconnecting event ignored");
            return;
        }
        self.transition(ConnectionStatus::Reconnecting);
        self.reconnecting_since = Some(Instant::now());
        self.emit(SessionEvent::Reconnecting);
    }

    async fn on_reconnected(&mut self) {
        if self.status != ConnectionStatus::Reconnecting {
            debug!(target: "session.actor", status = %self.status, "Reconnected event ignored");
            return;
        }
        self.transition(ConnectionStatus::Connected);
        self.record_reconnect_duration();

        let pending = self.signals.drain_pending();
        self.gauges.set_pending_signals(0);
        if let Some(oldest) = pending.first() {
            info!(
                target: "session.signal",
                count = pending.len(),
                oldest_wait_ms = u64::try_from(oldest.waited().as_millis()).unwrap_or(u64::MAX),
                "Flushing signals queued during reconnect"
            );
        }
        for queued in pending {
            self.send_signal(&queued.signal).await;
        }

        self.emit(SessionEvent::Reconnected);
    }

    fn on_stream_created(&mut self, mut stream: Stream) {
        if self.moderation.should_start_muted(&stream.stream_id) {
            stream.audio_muted = true;
        }
        if self.registry.upsert_stream(stream.clone()) {
            self.gauges.set_streams(self.registry.stream_count());
            self.emit(SessionEvent::StreamCreated(stream));
        }
    }

    fn on_stream_destroyed(&mut self, stream_id: &StreamId) {
        let Some(stream) = self.registry.remove_stream(stream_id) else {
            return;
        };
        self.gauges.set_streams(self.registry.stream_count());

        // Subscribers of a vanished stream are gone with it.
        self.subscribers
            .retain(|_, subscriber| &subscriber.stream_id != stream_id);

        self.emit(SessionEvent::StreamDestroyed(stream));
    }

    fn on_connection_created(&mut self, connection: Connection) {
        if !self.registry.upsert_connection(connection.clone()) {
            return;
        }
        self.gauges.set_connections(self.registry.connection_count());
        if !self.settings.connection_events_suppressed {
            self.emit(SessionEvent::ConnectionCreated(connection));
        }
    }

    fn on_connection_destroyed(&mut self, connection_id: &ConnectionId) {
        let Some(connection) = self.registry.remove_connection(connection_id) else {
            return;
        };
        self.gauges.set_connections(self.registry.connection_count());
        if !self.settings.connection_events_suppressed {
            self.emit(SessionEvent::ConnectionDestroyed(connection));
        }
    }

    fn on_archive_stopped(&mut self, archive_id: ArchiveId) {
        if self
            .active_archive
            .as_ref()
            .is_some_and(|archive| archive.archive_id == archive_id)
        {
            self.active_archive = None;
        }
        self.emit(SessionEvent::ArchiveStopped { archive_id });
    }

    async fn on_fatal_error(&mut self, reason: String) {
        if self.status == ConnectionStatus::Disconnecting {
            warn!(
                target: "session.actor",
                reason = %reason,
                "Fatal transport error while disconnecting, closing"
            );
            self.finish_disconnect();
            return;
        }
        self.fail_session(SessionError::TransportFailure(reason))
            .await;
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn require_live(&self) -> Result<(), SessionError> {
        if self.status.accepts_intents() {
            Ok(())
        } else {
            Err(SessionError::NotConnected {
                status: self.status,
            })
        }
    }

    fn transition(&mut self, next: ConnectionStatus) -> bool {
        let previous = self.status;
        if !previous.can_transition_to(next) {
            warn!(
                target: "session.actor",
                from = %previous,
                to = %next,
                "Illegal status transition refused"
            );
            return false;
        }

        self.status = next;
        observability::record_state_transition(previous, next);
        debug!(
            target: "session.actor",
            from = %previous,
            to = %next,
            "Status changed"
        );
        true
    }

    async fn send_signal(&mut self, signal: &OutboundSignal) {
        match self.transport.send_signal(signal).await {
            Ok(()) => observability::record_signal("sent"),
            Err(e) => {
                observability::record_signal("failed");
                self.report_transport_failure("signal", e);
            }
        }
    }

    /// Report a refused hand-off through the observer channel only.
    fn report_transport_failure(&mut self, operation: &'static str, error: TransportError) {
        warn!(
            target: "session.transport",
            operation,
            error = %error,
            "Transport hand-off failed"
        );
        let error = SessionError::from(error);
        observability::record_error(operation, error.kind());
        self.emit(SessionEvent::Failed {
            error,
            fatal: false,
        });
    }

    /// Move to `Failed`, tearing down everything.
    async fn fail_session(&mut self, error: SessionError) {
        warn!(
            target: "session.actor",
            status = %self.status,
            error = %error,
            "Session failed"
        );
        self.teardown_media().await;
        self.discard_pending_signals();
        self.clear_session_state();
        self.reconnecting_since = None;
        self.transition(ConnectionStatus::Failed);
        observability::record_error("session", error.kind());
        self.emit(SessionEvent::Failed { error, fatal: true });
    }

    /// Complete a disconnect: drop all session state and notify once.
    fn finish_disconnect(&mut self) {
        self.discard_pending_signals();
        self.publishers.clear();
        self.subscribers.clear();
        self.clear_session_state();
        self.record_reconnect_duration();

        if self.transition(ConnectionStatus::NotConnected) {
            info!(target: "session.actor", "Session disconnected");
            self.emit(SessionEvent::Disconnected);
        }
    }

    fn clear_session_state(&mut self) {
        self.registry.clear();
        self.moderation.reset();
        self.capabilities.revoke();
        self.local_connection = None;
        self.active_archive = None;
        self.gauges.set_streams(0);
        self.gauges.set_connections(0);
    }

    fn record_reconnect_duration(&mut self) {
        if let Some(since) = self.reconnecting_since.take() {
            observability::record_reconnect_duration(since.elapsed());
        }
    }

    fn discard_pending_signals(&mut self) {
        let discarded = self.signals.discard_pending();
        if discarded > 0 {
            debug!(
                target: "session.signal",
                discarded,
                "Queued signals discarded"
            );
            for _ in 0..discarded {
                observability::record_signal("discarded");
            }
        }
        self.gauges.set_pending_signals(0);
    }

    /// Ask the transport to stop every owned publisher and subscriber.
    async fn teardown_media(&mut self) {
        let publishers: Vec<PublisherId> = self.publishers.drain().map(|(id, _)| id).collect();
        for publisher_id in publishers {
            if let Err(e) = self.transport.unpublish(&publisher_id).await {
                debug!(
                    target: "session.transport",
                    publisher_id = %publisher_id,
                    error = %e,
                    "Publisher teardown failed"
                );
            }
        }

        let subscribers: Vec<SubscriberId> =
            self.subscribers.drain().map(|(id, _)| id).collect();
        for subscriber_id in subscribers {
            if let Err(e) = self.transport.unsubscribe(&subscriber_id).await {
                debug!(
                    target: "session.transport",
                    subscriber_id = %subscriber_id,
                    error = %e,
                    "Subscriber teardown failed"
                );
            }
        }
    }

    fn emit(&mut self, event: SessionEvent) {
        observability::record_event_dispatched(event.kind());
        self.observers
            .retain(|observer| observer.send(event.clone()).is_ok());
    }

    fn get_state(&self) -> SessionState {
        let mut streams: Vec<Stream> = self.registry.streams().cloned().collect();
        streams.sort_by(|a, b| a.stream_id.cmp(&b.stream_id));

        let mut connections: Vec<Connection> = self.registry.connections().cloned().collect();
        connections.sort_by(|a, b| a.connection_id.cmp(&b.connection_id));

        let mut publishers: Vec<PublisherId> = self.publishers.keys().cloned().collect();
        publishers.sort();
        let mut subscribers: Vec<SubscriberId> = self.subscribers.keys().cloned().collect();
        subscribers.sort();

        SessionState {
            session_id: self.session_id.clone(),
            status: self.status,
            local_connection: self.local_connection.clone(),
            capabilities: self.capabilities.granted(),
            streams,
            connections,
            force_mute: self.moderation.state().clone(),
            active_archive: self.active_archive.clone(),
            pending_signals: self.signals.pending_len(),
            publishers,
            subscribers,
        }
    }

    /// Release: tear down media and close the network session.
    async fn graceful_shutdown(&mut self) {
        if !self.status.has_network_session() && self.status != ConnectionStatus::Disconnecting {
            return;
        }

        info!(
            target: "session.actor",
            status = %self.status,
            publishers = self.publishers.len(),
            subscribers = self.subscribers.len(),
            "Releasing live session"
        );

        if self.status != ConnectionStatus::Disconnecting {
            self.transition(ConnectionStatus::Disconnecting);
            self.teardown_media().await;
            if let Err(e) = self.transport.disconnect().await {
                debug!(target: "session.transport", error = %e, "Disconnect on release failed");
            }
        }
        self.finish_disconnect();
    }
}

/// Send an intent's result back and count synchronous failures.
fn respond(operation: &'static str, result: Result<(), SessionError>, respond_to: Reply) {
    if let Err(e) = &result {
        debug!(
            target: "session.actor",
            operation,
            error = %e,
            "Intent rejected"
        );
        observability::record_error(operation, e.kind());
    }
    let _ = respond_to.send(result);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::capabilities::Role;
    use crate::transport::mock::{MockTransport, TransportCall};
    use std::time::Duration;

    const TOKEN: &str = "validtoken";

    fn test_config() -> Config {
        Config::new("45828062", "session-under-test")
    }

    fn spawn_with(
        config: &Config,
    ) -> (SessionHandle, Arc<MockTransport>, JoinHandle<()>) {
        let transport = Arc::new(MockTransport::new());
        let (handle, task) =
            SessionActor::spawn(config, transport.clone(), CancellationToken::new());
        (handle, transport, task)
    }

    fn spawn() -> (SessionHandle, Arc<MockTransport>, JoinHandle<()>) {
        spawn_with(&test_config())
    }

    async fn connect_as(
        handle: &SessionHandle,
        transport: &MockTransport,
        role: Role,
    ) -> TransportReporter {
        handle.connect(TOKEN).await.unwrap();
        let reporter = transport.reporter().unwrap();
        reporter
            .report_connected(Connection::new("local-conn"), Capabilities::for_role(role))
            .await
            .unwrap();
        reporter
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_connect_transitions_and_grants_capabilities() {
        let (handle, transport, _task) = spawn();
        let mut events = handle.subscribe_events().await.unwrap();

        handle.connect(TOKEN).await.unwrap();
        assert_eq!(
            handle.get_state().await.unwrap().status,
            ConnectionStatus::Connecting
        );
        assert!(handle.get_state().await.unwrap().capabilities.is_none());

        let reporter = transport.reporter().unwrap();
        reporter
            .report_connected(
                Connection::new("local-conn"),
                Capabilities::for_role(Role::Publisher),
            )
            .await
            .unwrap();

        let event = next_event(&mut events).await;
        assert!(matches!(
            &event,
            SessionEvent::Connected { connection }
                if connection.connection_id.as_str() == "local-conn"
        ));

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(
            state.capabilities,
            Some(Capabilities::for_role(Role::Publisher))
        );
        assert_eq!(
            state.local_connection.unwrap().connection_id.as_str(),
            "local-conn"
        );
        handle.cancel();
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_credential_without_transport_call() {
        let (handle, transport, _task) = spawn();

        for bad in ["", "has space", "tab\there"] {
            let result = handle.connect(bad).await;
            assert_eq!(
                result,
                Err(SessionError::InvalidArgument(
                    InvalidArgumentError::MalformedCredential
                ))
            );
        }

        assert_eq!(transport.call_count(), 0);
        assert_eq!(
            handle.get_state().await.unwrap().status,
            ConnectionStatus::NotConnected
        );
        handle.cancel();
    }

    #[tokio::test]
    async fn test_second_connect_fails_and_leaves_first_in_flight() {
        let (handle, transport, _task) = spawn();

        handle.connect(TOKEN).await.unwrap();
        let second = handle.connect(TOKEN).await;
        assert_eq!(
            second,
            Err(SessionError::NotConnected {
                status: ConnectionStatus::Connecting
            })
        );
        assert_eq!(transport.calls(), vec![TransportCall::Connect]);

        transport
            .reporter()
            .unwrap()
            .report_connected(
                Connection::new("local-conn"),
                Capabilities::for_role(Role::Subscriber),
            )
            .await
            .unwrap();
        assert_eq!(
            handle.get_state().await.unwrap().status,
            ConnectionStatus::Connected
        );
        handle.cancel();
    }

    #[tokio::test]
    async fn test_connect_failure_is_terminal() {
        let (handle, transport, _task) = spawn();
        let mut events = handle.subscribe_events().await.unwrap();

        handle.connect(TOKEN).await.unwrap();
        transport
            .reporter()
            .unwrap()
            .report_connect_failed("authentication rejected")
            .await
            .unwrap();

        assert!(matches!(
            next_event(&mut events).await,
            SessionEvent::Failed {
                error: SessionError::TransportFailure(_),
                fatal: true
            }
        ));

        assert_eq!(
            handle.connect(TOKEN).await,
            Err(SessionError::NotConnected {
                status: ConnectionStatus::Failed
            })
        );
        handle.cancel();
    }

    #[tokio::test]
    async fn test_connect_hand_off_failure_reported_async_only() {
        let transport = Arc::new(MockTransport::failing_connect());
        let (handle, _task) =
            SessionActor::spawn(&test_config(), transport.clone(), CancellationToken::new());
        let mut events = handle.subscribe_events().await.unwrap();

        // The call itself succeeds; the failure arrives on the observer channel.
        assert!(handle.connect(TOKEN).await.is_ok());
        assert!(matches!(
            next_event(&mut events).await,
            SessionEvent::Failed { fatal: true, .. }
        ));
        assert_eq!(
            handle.get_state().await.unwrap().status,
            ConnectionStatus::Failed
        );
        handle.cancel();
    }

    #[tokio::test]
    async fn test_intents_rejected_before_connect() {
        let (handle, transport, _task) = spawn();
        let not_connected = Err(SessionError::NotConnected {
            status: ConnectionStatus::NotConnected,
        });

        assert_eq!(handle.publish(Publisher::new()).await, not_connected);
        assert_eq!(handle.subscribe(Subscriber::new("s1")).await, not_connected);
        assert_eq!(handle.signal("chat", "hi", None, true).await, not_connected);
        assert_eq!(handle.force_mute_all(None).await, not_connected);
        assert_eq!(handle.disable_force_mute().await, not_connected);
        assert_eq!(handle.disconnect().await, not_connected);

        assert_eq!(transport.call_count(), 0);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_capabilities_gate_calls_locally() {
        let (handle, transport, _task) = spawn();
        let reporter = connect_as(&handle, &transport, Role::Subscriber).await;
        reporter
            .report_stream_created(Stream::new("s1", "remote"))
            .await
            .unwrap();
        transport.clear_calls();

        assert!(matches!(
            handle.publish(Publisher::new()).await,
            Err(SessionError::PermissionDenied(_))
        ));
        assert!(matches!(
            handle.force_mute_all(None).await,
            Err(SessionError::PermissionDenied(_))
        ));
        assert!(matches!(
            handle.force_mute_stream(StreamId::from("s1")).await,
            Err(SessionError::PermissionDenied(_))
        ));
        assert!(matches!(
            handle.disable_force_mute().await,
            Err(SessionError::PermissionDenied(_))
        ));
        assert_eq!(transport.call_count(), 0);

        // Subscribing is allowed for this role.
        handle.subscribe(Subscriber::new("s1")).await.unwrap();
        assert_eq!(transport.call_count(), 1);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_subscribe_requires_registered_stream() {
        let (handle, transport, _task) = spawn();
        connect_as(&handle, &transport, Role::Publisher).await;

        assert_eq!(
            handle.subscribe(Subscriber::new("missing")).await,
            Err(SessionError::InvalidArgument(
                InvalidArgumentError::UnknownStream
            ))
        );
        handle.cancel();
    }

    #[tokio::test]
    async fn test_publish_and_unpublish_bookkeeping() {
        let (handle, transport, _task) = spawn();
        connect_as(&handle, &transport, Role::Publisher).await;

        let publisher = Publisher::new().with_name("camera");
        let id = publisher.publisher_id.clone();
        handle.publish(publisher.clone()).await.unwrap();
        assert_eq!(
            handle.publish(publisher).await,
            Err(SessionError::InvalidArgument(
                InvalidArgumentError::DuplicatePublisher
            ))
        );
        assert_eq!(handle.get_state().await.unwrap().publishers, vec![id.clone()]);

        handle.unpublish(id.clone()).await.unwrap();
        assert_eq!(
            handle.unpublish(id.clone()).await,
            Err(SessionError::InvalidArgument(
                InvalidArgumentError::UnknownPublisher
            ))
        );
        assert!(transport.calls().contains(&TransportCall::Unpublish(id)));
        handle.cancel();
    }

    #[tokio::test]
    async fn test_publish_hand_off_failure_becomes_failed_event() {
        let (handle, transport, _task) = spawn();
        connect_as(&handle, &transport, Role::Publisher).await;
        let mut events = handle.subscribe_events().await.unwrap();
        transport.set_fail_publish(true);

        assert!(handle.publish(Publisher::new()).await.is_ok());
        assert!(matches!(
            next_event(&mut events).await,
            SessionEvent::Failed {
                error: SessionError::TransportFailure(_),
                fatal: false
            }
        ));
        assert!(handle.get_state().await.unwrap().publishers.is_empty());
        handle.cancel();
    }

    #[tokio::test]
    async fn test_signal_with_space_never_reaches_transport() {
        let (handle, transport, _task) = spawn();
        connect_as(&handle, &transport, Role::Publisher).await;
        transport.clear_calls();

        let result = handle.signal("chat message", "hi", None, true).await;
        assert_eq!(
            result,
            Err(SessionError::InvalidArgument(
                InvalidArgumentError::InvalidSignalType
            ))
        );
        assert_eq!(transport.call_count(), 0);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_signal_validation_precedes_status_check() {
        let (handle, _transport, _task) = spawn();
        let oversized = "x".repeat(8193);
        assert!(matches!(
            handle.signal("chat", oversized, None, true).await,
            Err(SessionError::InvalidArgument(
                InvalidArgumentError::SignalDataTooLong { .. }
            ))
        ));
        handle.cancel();
    }

    #[tokio::test]
    async fn test_signals_queue_during_reconnect_and_flush_fifo() {
        let (handle, transport, _task) = spawn();
        let reporter = connect_as(&handle, &transport, Role::Publisher).await;
        let mut events = handle.subscribe_events().await.unwrap();

        reporter.report_reconnecting().await.unwrap();
        handle.signal("chat", "one", None, true).await.unwrap();
        handle.signal("chat", "dropped", None, false).await.unwrap();
        handle.signal("chat", "two", None, true).await.unwrap();
        assert_eq!(handle.get_state().await.unwrap().pending_signals, 2);
        assert!(transport.sent_signals().is_empty());

        reporter.report_reconnected().await.unwrap();

        assert_eq!(next_event(&mut events).await, SessionEvent::Reconnecting);
        assert_eq!(next_event(&mut events).await, SessionEvent::Reconnected);

        let payloads: Vec<String> = transport
            .sent_signals()
            .into_iter()
            .map(|s| s.payload)
            .collect();
        assert_eq!(payloads, vec!["one", "two"]);
        assert_eq!(handle.get_state().await.unwrap().pending_signals, 0);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_flush_reports_each_failure_and_continues() {
        let (handle, transport, _task) = spawn();
        let reporter = connect_as(&handle, &transport, Role::Publisher).await;
        let mut events = handle.subscribe_events().await.unwrap();

        reporter.report_reconnecting().await.unwrap();
        handle.signal("a", "1", None, true).await.unwrap();
        handle.signal("b", "2", None, true).await.unwrap();
        transport.set_fail_signals(true);
        reporter.report_reconnected().await.unwrap();

        assert_eq!(next_event(&mut events).await, SessionEvent::Reconnecting);
        for _ in 0..2 {
            assert!(matches!(
                next_event(&mut events).await,
                SessionEvent::Failed { fatal: false, .. }
            ));
        }
        assert_eq!(next_event(&mut events).await, SessionEvent::Reconnected);
        assert_eq!(transport.sent_signals().len(), 2);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_reconnect_abandoned_discards_queue_and_resets() {
        let (handle, transport, _task) = spawn();
        let reporter = connect_as(&handle, &transport, Role::Publisher).await;
        handle.publish(Publisher::new()).await.unwrap();
        let mut events = handle.subscribe_events().await.unwrap();

        reporter.report_reconnecting().await.unwrap();
        handle.signal("chat", "lost", None, true).await.unwrap();
        reporter.report_disconnected().await.unwrap();

        assert_eq!(next_event(&mut events).await, SessionEvent::Reconnecting);
        assert!(matches!(
            next_event(&mut events).await,
            SessionEvent::Failed { fatal: false, .. }
        ));
        assert_eq!(next_event(&mut events).await, SessionEvent::Disconnected);

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.status, ConnectionStatus::NotConnected);
        assert_eq!(state.pending_signals, 0);
        assert!(state.publishers.is_empty());
        assert!(state.capabilities.is_none());
        assert!(transport.sent_signals().is_empty());

        // A brand-new connect is allowed.
        handle.connect(TOKEN).await.unwrap();
        handle.cancel();
    }

    #[tokio::test]
    async fn test_disconnect_tears_down_and_notifies_once() {
        let (handle, transport, _task) = spawn();
        let reporter = connect_as(&handle, &transport, Role::Publisher).await;
        reporter
            .report_stream_created(Stream::new("remote-1", "remote"))
            .await
            .unwrap();

        let publisher = Publisher::new();
        let publisher_id = publisher.publisher_id.clone();
        handle.publish(publisher).await.unwrap();
        let subscriber = Subscriber::new("remote-1");
        let subscriber_id = subscriber.subscriber_id.clone();
        handle.subscribe(subscriber).await.unwrap();

        let mut events = handle.subscribe_events().await.unwrap();
        handle.disconnect().await.unwrap();
        assert_eq!(
            handle.get_state().await.unwrap().status,
            ConnectionStatus::Disconnecting
        );

        let calls = transport.calls();
        assert!(calls.contains(&TransportCall::Unpublish(publisher_id)));
        assert!(calls.contains(&TransportCall::Unsubscribe(subscriber_id)));
        assert_eq!(calls.last(), Some(&TransportCall::Disconnect));

        // Late stream event during Disconnecting, then closure reported twice.
        reporter.report_stream_destroyed("remote-1").await.unwrap();
        reporter.report_disconnected().await.unwrap();
        reporter.report_disconnected().await.unwrap();

        assert!(matches!(
            next_event(&mut events).await,
            SessionEvent::StreamDestroyed(_)
        ));
        assert_eq!(next_event(&mut events).await, SessionEvent::Disconnected);

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.status, ConnectionStatus::NotConnected);
        assert!(state.streams.is_empty());
        assert!(events.try_recv().is_err());
        handle.cancel();
    }

    #[tokio::test]
    async fn test_disconnect_supersedes_pending_connect() {
        let (handle, transport, _task) = spawn();
        handle.connect(TOKEN).await.unwrap();
        handle.disconnect().await.unwrap();

        let reporter = transport.reporter().unwrap();
        // A late connected report must not resurrect the session.
        reporter
            .report_connected(
                Connection::new("late"),
                Capabilities::for_role(Role::Publisher),
            )
            .await
            .unwrap();
        reporter.report_disconnected().await.unwrap();

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.status, ConnectionStatus::NotConnected);
        assert!(state.local_connection.is_none());
        handle.cancel();
    }

    #[tokio::test]
    async fn test_force_mute_all_applies_to_new_streams_only() {
        let (handle, transport, _task) = spawn();
        let reporter = connect_as(&handle, &transport, Role::Moderator).await;
        reporter
            .report_stream_created(Stream::new("existing", "remote"))
            .await
            .unwrap();

        handle.force_mute_all(None).await.unwrap();
        assert!(transport
            .calls()
            .contains(&TransportCall::ForceMuteAll(None)));

        reporter
            .report_stream_created(Stream::new("new", "remote"))
            .await
            .unwrap();

        let state = handle.get_state().await.unwrap();
        assert!(!state.stream("existing").unwrap().audio_muted);
        assert!(state.stream("new").unwrap().audio_muted);

        // Explicit per-stream mute event updates the existing stream.
        reporter
            .report_stream_audio_muted("existing", true)
            .await
            .unwrap();
        let state = handle.get_state().await.unwrap();
        assert!(state.stream("existing").unwrap().audio_muted);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_disable_force_mute_keeps_muted_streams_muted() {
        let (handle, transport, _task) = spawn();
        let reporter = connect_as(&handle, &transport, Role::Moderator).await;

        handle.force_mute_all(None).await.unwrap();
        reporter
            .report_stream_created(Stream::new("muted", "remote"))
            .await
            .unwrap();
        handle.disable_force_mute().await.unwrap();
        reporter
            .report_stream_created(Stream::new("after", "remote"))
            .await
            .unwrap();

        let state = handle.get_state().await.unwrap();
        assert!(state.stream("muted").unwrap().audio_muted);
        assert!(!state.stream("after").unwrap().audio_muted);
        assert!(!state.force_mute.is_active());
        handle.cancel();
    }

    #[tokio::test]
    async fn test_remote_mute_forced_sets_prospective_state() {
        let (handle, transport, _task) = spawn();
        let reporter = connect_as(&handle, &transport, Role::Subscriber).await;
        let mut events = handle.subscribe_events().await.unwrap();

        reporter
            .report_mute_forced(true, Some(vec![StreamId::from("spared")]))
            .await
            .unwrap();
        assert_eq!(
            next_event(&mut events).await,
            SessionEvent::MuteForced(MuteForcedInfo { active: true })
        );

        reporter
            .report_stream_created(Stream::new("spared", "remote"))
            .await
            .unwrap();
        reporter
            .report_stream_created(Stream::new("other", "remote"))
            .await
            .unwrap();

        let state = handle.get_state().await.unwrap();
        assert!(!state.stream("spared").unwrap().audio_muted);
        assert!(state.stream("other").unwrap().audio_muted);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_connection_events_suppressed_still_updates_registry() {
        let mut config = test_config();
        config.settings.connection_events_suppressed = true;
        let (handle, transport, _task) = spawn_with(&config);
        let reporter = connect_as(&handle, &transport, Role::Publisher).await;
        let mut events = handle.subscribe_events().await.unwrap();

        reporter
            .report_connection_created(Connection::new("remote-conn"))
            .await
            .unwrap();
        reporter
            .report_signal_received("ping", "", None)
            .await
            .unwrap();

        // The signal is the first event seen; the connection event was suppressed.
        assert!(matches!(
            next_event(&mut events).await,
            SessionEvent::SignalReceived { .. }
        ));
        let state = handle.get_state().await.unwrap();
        assert!(state
            .connections
            .iter()
            .any(|c| c.connection_id.as_str() == "remote-conn"));
        handle.cancel();
    }

    #[tokio::test]
    async fn test_fatal_error_fails_session() {
        let (handle, transport, _task) = spawn();
        let reporter = connect_as(&handle, &transport, Role::Publisher).await;
        handle.publish(Publisher::new()).await.unwrap();
        let mut events = handle.subscribe_events().await.unwrap();

        reporter.report_fatal_error("media engine crashed").await.unwrap();

        assert!(matches!(
            next_event(&mut events).await,
            SessionEvent::Failed { fatal: true, .. }
        ));
        let state = handle.get_state().await.unwrap();
        assert_eq!(state.status, ConnectionStatus::Failed);
        assert!(state.publishers.is_empty());
        handle.cancel();
    }

    #[tokio::test]
    async fn test_turn_servers_snapshotted_at_connect() {
        let mut config = test_config();
        config.max_turn_servers = 2;
        let (handle, transport, _task) = spawn_with(&config);

        handle
            .add_turn_server("turn:a.example.com", "u", "c")
            .await
            .unwrap();
        handle
            .add_turn_server("turn:b.example.com", "u", "c")
            .await
            .unwrap();
        assert_eq!(
            handle.add_turn_server("turn:c.example.com", "u", "c").await,
            Err(SessionError::InvalidArgument(
                InvalidArgumentError::TurnServerLimitExceeded { max: 2 }
            ))
        );

        handle.connect(TOKEN).await.unwrap();
        let request = transport.last_connect().unwrap();
        assert_eq!(request.ice.custom_servers().len(), 2);
        assert_eq!(request.api_key, "45828062");
        handle.cancel();
    }

    #[tokio::test]
    async fn test_encryption_secret_validation_and_forwarding() {
        let (handle, transport, _task) = spawn();

        assert_eq!(
            handle.set_encryption_secret("short").await,
            Err(SessionError::InvalidArgument(
                InvalidArgumentError::InvalidEncryptionSecret
            ))
        );
        handle.set_encryption_secret("long-enough-secret").await.unwrap();
        assert_eq!(transport.call_count(), 0);

        connect_as(&handle, &transport, Role::Publisher).await;
        assert_eq!(
            transport
                .last_connect()
                .unwrap()
                .encryption_secret
                .map(|s| s.expose_secret().to_string()),
            Some("long-enough-secret".to_string())
        );

        handle.set_encryption_secret("rotated-secret").await.unwrap();
        assert!(transport
            .calls()
            .contains(&TransportCall::SetEncryptionSecret));
        handle.cancel();
    }

    #[tokio::test]
    async fn test_archive_tracking() {
        let (handle, transport, _task) = spawn();
        let reporter = connect_as(&handle, &transport, Role::Publisher).await;

        reporter
            .report_archive_started("arch-1", Some("standup".to_string()))
            .await
            .unwrap();
        let archive = handle.get_state().await.unwrap().active_archive.unwrap();
        assert_eq!(archive.archive_id.as_str(), "arch-1");

        reporter.report_archive_stopped("arch-1").await.unwrap();
        assert!(handle.get_state().await.unwrap().active_archive.is_none());
        handle.cancel();
    }

    #[tokio::test]
    async fn test_cancel_releases_live_session() {
        let (handle, transport, task) = spawn();
        connect_as(&handle, &transport, Role::Publisher).await;
        let publisher = Publisher::new();
        let publisher_id = publisher.publisher_id.clone();
        handle.publish(publisher).await.unwrap();
        let mut events = handle.subscribe_events().await.unwrap();

        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();

        let calls = transport.calls();
        assert!(calls.contains(&TransportCall::Unpublish(publisher_id)));
        assert_eq!(calls.last(), Some(&TransportCall::Disconnect));
        assert_eq!(next_event(&mut events).await, SessionEvent::Disconnected);
        assert!(handle.get_state().await.is_err());
    }

    #[tokio::test]
    async fn test_dropping_all_handles_stops_actor() {
        let (handle, transport, task) = spawn();
        handle.connect(TOKEN).await.unwrap();
        let reporter = transport.reporter().unwrap();
        drop(handle);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(reporter.is_closed());
        assert!(reporter.report_reconnecting().await.is_err());
    }
}
