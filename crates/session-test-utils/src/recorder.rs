//! Event recorder for session observers.

use session_client::SessionEvent;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default wait for an expected event.
pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Wraps an observer channel and keeps every event it has seen.
#[derive(Debug)]
pub struct EventRecorder {
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
    seen: Vec<SessionEvent>,
}

impl EventRecorder {
    /// Wrap an observer channel from `SessionHandle::subscribe_events`.
    #[must_use]
    pub fn new(receiver: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        Self {
            receiver,
            seen: Vec::new(),
        }
    }

    /// Wait for the next event.
    ///
    /// # Errors
    ///
    /// Fails on timeout or if the session was released.
    pub async fn next(&mut self) -> Result<SessionEvent, anyhow::Error> {
        let event = tokio::time::timeout(DEFAULT_EVENT_TIMEOUT, self.receiver.recv())
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for session event"))?
            .ok_or_else(|| anyhow::anyhow!("session event channel closed"))?;
        self.seen.push(event.clone());
        Ok(event)
    }

    /// Wait until an event matching `predicate` arrives, recording every
    /// event on the way.
    ///
    /// # Errors
    ///
    /// Fails on timeout or if the session was released first.
    pub async fn wait_for(
        &mut self,
        predicate: impl Fn(&SessionEvent) -> bool,
    ) -> Result<SessionEvent, anyhow::Error> {
        self.wait_for_within(DEFAULT_EVENT_TIMEOUT, predicate).await
    }

    /// [`wait_for`](Self::wait_for) with an explicit timeout.
    ///
    /// # Errors
    ///
    /// Fails on timeout or if the session was released first.
    pub async fn wait_for_within(
        &mut self,
        timeout: Duration,
        predicate: impl Fn(&SessionEvent) -> bool,
    ) -> Result<SessionEvent, anyhow::Error> {
        let wait = async {
            while let Some(event) = self.receiver.recv().await {
                self.seen.push(event.clone());
                if predicate(&event) {
                    return Ok(event);
                }
            }
            Err(anyhow::anyhow!("session event channel closed"))
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for matching session event"))?
    }

    /// Move every already-delivered event into the record without waiting.
    pub fn drain(&mut self) -> &[SessionEvent] {
        while let Ok(event) = self.receiver.try_recv() {
            self.seen.push(event);
        }
        &self.seen
    }

    /// Every event recorded so far.
    #[must_use]
    pub fn seen(&self) -> &[SessionEvent] {
        &self.seen
    }

    /// Number of recorded events matching `predicate`.
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&SessionEvent) -> bool) -> usize {
        self.seen.iter().filter(|e| predicate(e)).count()
    }

    /// Recorded event kinds, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.seen.iter().map(SessionEvent::kind).collect()
    }
}
