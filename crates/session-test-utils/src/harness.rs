//! Session harness for integration testing
//!
//! Provides `TestSession`: a real `SessionActor` driven through a
//! `MockTransport`, so a test can play the network side by hand.

use crate::fixtures::{test_config, VALID_CREDENTIAL};
use crate::recorder::EventRecorder;
use session_client::capabilities::{Capabilities, Role};
use session_client::entities::Connection;
use session_client::transport::mock::MockTransport;
use session_client::transport::TransportReporter;
use session_client::{Config, ConnectionStatus, SessionActor, SessionHandle, SessionState};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Local connection ID reported by [`TestSession::connect_as`].
pub const LOCAL_CONNECTION_ID: &str = "local-connection";

/// Test harness around one session actor.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_publish() -> Result<(), anyhow::Error> {
///     let mut session = TestSession::spawn().await?;
///     session.connect_as(Role::Publisher).await?;
///
///     session.handle.publish(Publisher::new()).await?;
///     assert_eq!(session.transport.call_count(), 2);
///     Ok(())
/// }
/// ```
pub struct TestSession {
    /// Caller-side handle.
    pub handle: SessionHandle,
    /// Recording transport behind the session.
    pub transport: Arc<MockTransport>,
    /// Observer registered at spawn time.
    pub events: EventRecorder,
    task: Option<JoinHandle<()>>,
}

impl TestSession {
    /// Spawn a session with default test configuration.
    ///
    /// # Errors
    ///
    /// Fails if the observer cannot be registered.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(&test_config(), MockTransport::new()).await
    }

    /// Spawn a session with explicit configuration and transport.
    ///
    /// # Errors
    ///
    /// Fails if the observer cannot be registered.
    pub async fn spawn_with(
        config: &Config,
        transport: MockTransport,
    ) -> Result<Self, anyhow::Error> {
        let transport = Arc::new(transport);
        let (handle, task) = SessionActor::spawn(
            config,
            Arc::clone(&transport) as Arc<dyn session_client::transport::Transport>,
            CancellationToken::new(),
        );

        let events = EventRecorder::new(handle.subscribe_events().await?);

        Ok(Self {
            handle,
            transport,
            events,
            task: Some(task),
        })
    }

    /// Connect with a valid credential and report the network session as
    /// established with the role's capabilities. Waits for the `Connected`
    /// event and returns the reporter for further scripting.
    ///
    /// # Errors
    ///
    /// Fails if the connect is rejected or not confirmed in time.
    pub async fn connect_as(&mut self, role: Role) -> Result<TransportReporter, anyhow::Error> {
        self.handle.connect(VALID_CREDENTIAL).await?;

        let reporter = self
            .transport
            .reporter()
            .ok_or_else(|| anyhow::anyhow!("transport received no connect request"))?;
        reporter
            .report_connected(
                Connection::new(LOCAL_CONNECTION_ID),
                Capabilities::for_role(role),
            )
            .await?;

        self.events
            .wait_for(|e| matches!(e, session_client::SessionEvent::Connected { .. }))
            .await?;
        Ok(reporter)
    }

    /// Snapshot of the session state.
    ///
    /// # Errors
    ///
    /// Fails if the session has been released.
    pub async fn state(&self) -> Result<SessionState, anyhow::Error> {
        Ok(self.handle.get_state().await?)
    }

    /// Current connection status.
    ///
    /// # Errors
    ///
    /// Fails if the session has been released.
    pub async fn status(&self) -> Result<ConnectionStatus, anyhow::Error> {
        Ok(self.state().await?.status)
    }

    /// Cancel the session and wait for the actor to stop.
    ///
    /// # Errors
    ///
    /// Fails if the actor task panicked.
    pub async fn release(&mut self) -> Result<(), anyhow::Error> {
        self.handle.cancel();
        if let Some(task) = self.task.take() {
            task.await?;
        }
        Ok(())
    }

    /// Take the actor's join handle.
    pub fn take_task(&mut self) -> Option<JoinHandle<()>> {
        self.task.take()
    }
}

impl Drop for TestSession {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}
