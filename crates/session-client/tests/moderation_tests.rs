//! Force-mute and capability gate tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use common::types::StreamId;
use session_client::moderation::ForceMuteState;
use session_client::transport::mock::TransportCall;
use session_client::{InvalidArgumentError, MuteForcedInfo, Role, SessionError, SessionEvent};
use session_test_utils::{TestSession, TestStream};

#[tokio::test]
async fn test_force_mute_all_mutes_new_streams_but_not_existing() {
    let mut session = TestSession::spawn().await.unwrap();
    let reporter = session.connect_as(Role::Moderator).await.unwrap();

    reporter
        .report_stream_created(TestStream::new("existing").build())
        .await
        .unwrap();
    session.handle.force_mute_all(None).await.unwrap();
    reporter
        .report_stream_created(TestStream::new("new").build())
        .await
        .unwrap();

    let state = session.state().await.unwrap();
    assert!(!state.stream("existing").unwrap().audio_muted);
    assert!(state.stream("new").unwrap().audio_muted);
    assert!(state.force_mute.is_active());

    // The existing stream changes only on its own mute event.
    reporter
        .report_stream_audio_muted("existing", true)
        .await
        .unwrap();
    session
        .events
        .wait_for(|e| matches!(e, SessionEvent::StreamAudioMuted { muted: true, .. }))
        .await
        .unwrap();
    assert!(session
        .state()
        .await
        .unwrap()
        .stream("existing")
        .unwrap()
        .audio_muted);
}

#[tokio::test]
async fn test_force_mute_all_exclusions() {
    let mut session = TestSession::spawn().await.unwrap();
    let reporter = session.connect_as(Role::Moderator).await.unwrap();

    let excluded = vec![StreamId::from("presenter")];
    session
        .handle
        .force_mute_all(Some(excluded.clone()))
        .await
        .unwrap();
    assert!(session
        .transport
        .calls()
        .contains(&TransportCall::ForceMuteAll(Some(excluded))));

    reporter
        .report_stream_created(TestStream::new("presenter").build())
        .await
        .unwrap();
    reporter
        .report_stream_created(TestStream::new("audience").build())
        .await
        .unwrap();

    let state = session.state().await.unwrap();
    assert!(!state.stream("presenter").unwrap().audio_muted);
    assert!(state.stream("audience").unwrap().audio_muted);
    assert!(matches!(
        state.force_mute,
        ForceMuteState::Active { ref excluded } if excluded.len() == 1
    ));
}

#[tokio::test]
async fn test_disable_force_mute_stops_muting_new_streams() {
    let mut session = TestSession::spawn().await.unwrap();
    let reporter = session.connect_as(Role::Moderator).await.unwrap();

    session.handle.force_mute_all(None).await.unwrap();
    session.handle.disable_force_mute().await.unwrap();
    reporter
        .report_stream_created(TestStream::new("late").build())
        .await
        .unwrap();

    let state = session.state().await.unwrap();
    assert!(!state.stream("late").unwrap().audio_muted);
    assert_eq!(state.force_mute, ForceMuteState::Inactive);
}

#[tokio::test]
async fn test_remote_mute_forced_is_observed_and_applied() {
    let mut session = TestSession::spawn().await.unwrap();
    let reporter = session.connect_as(Role::Subscriber).await.unwrap();

    reporter.report_mute_forced(true, None).await.unwrap();
    let event = session
        .events
        .wait_for(|e| matches!(e, SessionEvent::MuteForced(_)))
        .await
        .unwrap();
    assert_eq!(event, SessionEvent::MuteForced(MuteForcedInfo { active: true }));

    reporter
        .report_stream_created(TestStream::new("joined-later").build())
        .await
        .unwrap();
    assert!(session
        .state()
        .await
        .unwrap()
        .stream("joined-later")
        .unwrap()
        .audio_muted);

    reporter.report_mute_forced(false, None).await.unwrap();
    session
        .events
        .wait_for(|e| *e == SessionEvent::MuteForced(MuteForcedInfo { active: false }))
        .await
        .unwrap();
    assert!(!session.state().await.unwrap().force_mute.is_active());
}

#[tokio::test]
async fn test_force_mute_requires_moderator_role() {
    let mut session = TestSession::spawn().await.unwrap();
    let reporter = session.connect_as(Role::Publisher).await.unwrap();
    reporter
        .report_stream_created(TestStream::new("s1").build())
        .await
        .unwrap();
    session.transport.clear_calls();

    assert!(matches!(
        session.handle.force_mute_all(None).await,
        Err(SessionError::PermissionDenied(_))
    ));
    assert!(matches!(
        session.handle.force_mute_stream("s1".into()).await,
        Err(SessionError::PermissionDenied(_))
    ));
    assert_eq!(session.transport.call_count(), 0);

    // No asynchronous duplicate of the synchronous error.
    session.state().await.unwrap();
    assert_eq!(
        session
            .events
            .drain()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Failed { .. }))
            .count(),
        0
    );
}

#[tokio::test]
async fn test_force_mute_stream_requires_known_stream() {
    let mut session = TestSession::spawn().await.unwrap();
    let reporter = session.connect_as(Role::Moderator).await.unwrap();

    assert_eq!(
        session.handle.force_mute_stream("ghost".into()).await,
        Err(SessionError::InvalidArgument(
            InvalidArgumentError::UnknownStream
        ))
    );

    reporter
        .report_stream_created(TestStream::new("speaker").build())
        .await
        .unwrap();
    session
        .handle
        .force_mute_stream("speaker".into())
        .await
        .unwrap();
    assert!(session
        .transport
        .calls()
        .contains(&TransportCall::ForceMuteStream("speaker".into())));
}

#[tokio::test]
async fn test_subscriber_role_cannot_publish() {
    let mut session = TestSession::spawn().await.unwrap();
    session.connect_as(Role::Subscriber).await.unwrap();

    assert!(matches!(
        session
            .handle
            .publish(session_client::Publisher::new())
            .await,
        Err(SessionError::PermissionDenied(_))
    ));
}
