//! ICE/TURN configuration tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use session_client::transport::mock::MockTransport;
use session_client::{IcePolicy, InvalidArgumentError, IncludeServers, SessionError, TransportPolicy};
use session_test_utils::{test_config, TestSession, VALID_CREDENTIAL};

#[tokio::test]
async fn test_turn_server_limit_is_enforced() {
    let mut config = test_config();
    config.max_turn_servers = 3;
    let session = TestSession::spawn_with(&config, MockTransport::new())
        .await
        .unwrap();

    for i in 0..3 {
        session
            .handle
            .add_turn_server(format!("turn:turn{i}.example.com:3478"), "user", "secret")
            .await
            .unwrap();
    }

    let overflow = session
        .handle
        .add_turn_server("turns:turn9.example.com:5349", "user", "secret")
        .await;
    assert_eq!(
        overflow,
        Err(SessionError::InvalidArgument(
            InvalidArgumentError::TurnServerLimitExceeded { max: 3 }
        ))
    );

    session.handle.connect(VALID_CREDENTIAL).await.unwrap();
    let request = session.transport.last_connect().unwrap();
    assert_eq!(request.ice.custom_servers().len(), 3);
}

#[tokio::test]
async fn test_invalid_turn_entries_are_rejected_in_order() {
    let session = TestSession::spawn().await.unwrap();

    assert_eq!(
        session.handle.add_turn_server("http://example.com", "", "").await,
        Err(SessionError::InvalidArgument(
            InvalidArgumentError::InvalidTurnUrl
        ))
    );
    assert_eq!(
        session
            .handle
            .add_turn_server("turn:turn.example.com", "", "secret")
            .await,
        Err(SessionError::InvalidArgument(
            InvalidArgumentError::EmptyTurnCredential
        ))
    );

    session.handle.connect(VALID_CREDENTIAL).await.unwrap();
    assert!(session
        .transport
        .last_connect()
        .unwrap()
        .ice
        .custom_servers()
        .is_empty());
}

#[tokio::test]
async fn test_ice_policy_snapshot_taken_at_connect() {
    let session = TestSession::spawn().await.unwrap();

    let policy = IcePolicy {
        include_servers: IncludeServers::Custom,
        transport_policy: TransportPolicy::Relay,
        filter_out_lan_candidates: true,
    };
    session.handle.update_ice_policy(policy).await.unwrap();
    session
        .handle
        .add_turn_server("turn:relay.example.com", "user", "secret")
        .await
        .unwrap();
    session.handle.connect(VALID_CREDENTIAL).await.unwrap();

    // Changes after connect apply to the next connect only.
    session
        .handle
        .add_turn_server("turn:late.example.com", "user", "secret")
        .await
        .unwrap();

    let request = session.transport.last_connect().unwrap();
    assert_eq!(request.ice.policy(), policy);
    assert_eq!(request.ice.custom_servers().len(), 1);
}
