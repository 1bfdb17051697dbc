//! Recording transport for tests.
//!
//! `MockTransport` accepts every hand-off (unless told to fail), records each
//! call in order, and keeps the reporter from the latest connect so a test can
//! play the network side by hand.

use super::{ConnectRequest, OutboundSignal, PublishRequest, Transport, TransportReporter};
use crate::entities::Subscriber;
use crate::errors::TransportError;
use common::secret::SecretString;
use common::types::{PublisherId, StreamId, SubscriberId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect,
    Disconnect,
    Publish(PublishRequest),
    Unpublish(PublisherId),
    Subscribe(Subscriber),
    Unsubscribe(SubscriberId),
    SendSignal(OutboundSignal),
    ForceMuteAll(Option<Vec<StreamId>>),
    ForceMuteStream(StreamId),
    DisableForceMute,
    SetEncryptionSecret,
}

/// Mock transport for unit and integration testing.
#[derive(Debug, Default)]
pub struct MockTransport {
    calls: Mutex<Vec<TransportCall>>,
    last_connect: Mutex<Option<ConnectRequest>>,
    fail_connect: AtomicBool,
    fail_signals: AtomicBool,
    fail_publish: AtomicBool,
}

impl MockTransport {
    /// Create a mock that accepts every request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock whose connect hand-off fails.
    #[must_use]
    pub fn failing_connect() -> Self {
        let mock = Self::new();
        mock.fail_connect.store(true, Ordering::SeqCst);
        mock
    }

    /// Make subsequent `send_signal` hand-offs fail (or succeed again).
    pub fn set_fail_signals(&self, fail: bool) {
        self.fail_signals.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `publish` hand-offs fail (or succeed again).
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.calls).clone()
    }

    /// Number of calls so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Signals handed off so far, in order.
    #[must_use]
    pub fn sent_signals(&self) -> Vec<OutboundSignal> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                TransportCall::SendSignal(signal) => Some(signal.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// The most recent connect request.
    #[must_use]
    pub fn last_connect(&self) -> Option<ConnectRequest> {
        lock(&self.last_connect).clone()
    }

    /// Reporter from the most recent connect request.
    #[must_use]
    pub fn reporter(&self) -> Option<TransportReporter> {
        lock(&self.last_connect)
            .as_ref()
            .map(|request| request.reporter.clone())
    }

    fn record(&self, call: TransportCall) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn connect(&self, request: ConnectRequest) -> Result<(), TransportError> {
        self.record(TransportCall::Connect);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable(
                "mock connect failure".to_string(),
            ));
        }
        *lock(&self.last_connect) = Some(request);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.record(TransportCall::Disconnect);
        Ok(())
    }

    async fn publish(&self, request: PublishRequest) -> Result<(), TransportError> {
        self.record(TransportCall::Publish(request));
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("mock publish failure".to_string()));
        }
        Ok(())
    }

    async fn unpublish(&self, publisher_id: &PublisherId) -> Result<(), TransportError> {
        self.record(TransportCall::Unpublish(publisher_id.clone()));
        Ok(())
    }

    async fn subscribe(&self, subscriber: &Subscriber) -> Result<(), TransportError> {
        self.record(TransportCall::Subscribe(subscriber.clone()));
        Ok(())
    }

    async fn unsubscribe(&self, subscriber_id: &SubscriberId) -> Result<(), TransportError> {
        self.record(TransportCall::Unsubscribe(subscriber_id.clone()));
        Ok(())
    }

    async fn send_signal(&self, signal: &OutboundSignal) -> Result<(), TransportError> {
        self.record(TransportCall::SendSignal(signal.clone()));
        if self.fail_signals.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable(
                "mock signal failure".to_string(),
            ));
        }
        Ok(())
    }

    async fn force_mute_all(&self, excluded: Option<&[StreamId]>) -> Result<(), TransportError> {
        self.record(TransportCall::ForceMuteAll(excluded.map(<[StreamId]>::to_vec)));
        Ok(())
    }

    async fn force_mute_stream(&self, stream_id: &StreamId) -> Result<(), TransportError> {
        self.record(TransportCall::ForceMuteStream(stream_id.clone()));
        Ok(())
    }

    async fn disable_force_mute(&self) -> Result<(), TransportError> {
        self.record(TransportCall::DisableForceMute);
        Ok(())
    }

    async fn set_encryption_secret(&self, _secret: &SecretString) -> Result<(), TransportError> {
        self.record(TransportCall::SetEncryptionSecret);
        Ok(())
    }
}
