//! Session client error types.
//!
//! Errors fall into two reporting channels:
//! - Synchronous: returned at the call site of an intent call
//!   (`InvalidArgument`, `NotConnected`, `PermissionDenied`).
//! - Asynchronous: delivered through the observer channel as
//!   [`SessionEvent::Failed`](crate::events::SessionEvent::Failed)
//!   (`TransportFailure`).
//!
//! An error is only ever reported through one of the two channels.

use crate::state::ConnectionStatus;
use thiserror::Error;

/// Session client error type.
///
/// Maps to stable numeric codes:
/// - `InvalidArgument`: `INVALID_ARGUMENT` (1)
/// - `NotConnected`: `NOT_CONNECTED` (2)
/// - `PermissionDenied`: `PERMISSION_DENIED` (3)
/// - `TransportFailure`: `TRANSPORT_FAILURE` (4)
/// - `Internal`: `INTERNAL_ERROR` (5)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Caller supplied an argument that failed local validation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(InvalidArgumentError),

    /// The call is not permitted in the session's current status.
    #[error("Session is {status}, operation not permitted")]
    NotConnected { status: ConnectionStatus },

    /// The granted capabilities do not allow the call.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The transport collaborator failed (connect, signal send, session drop).
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// The session actor is gone or a reply channel was dropped.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Local validation failures (always synchronous, never retried).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvalidArgumentError {
    /// Credential is empty, too long, or contains non-printable characters.
    #[error("Malformed credential")]
    MalformedCredential,

    /// Signal type contains characters outside `[A-Za-z0-9_~-]`.
    #[error("Invalid signal type")]
    InvalidSignalType,

    /// Signal type exceeds the maximum length.
    #[error("Signal type too long ({len} > {max})")]
    SignalTypeTooLong { len: usize, max: usize },

    /// Signal payload exceeds the maximum byte size.
    #[error("Signal data too long ({len} > {max} bytes)")]
    SignalDataTooLong { len: usize, max: usize },

    /// TURN server URL does not parse or uses an unsupported scheme.
    #[error("Invalid TURN server URL")]
    InvalidTurnUrl,

    /// TURN username or credential is empty.
    #[error("Empty TURN server credential")]
    EmptyTurnCredential,

    /// The custom TURN server list is already at its maximum.
    #[error("TURN server limit exceeded (max {max})")]
    TurnServerLimitExceeded { max: usize },

    /// Encryption secret length is outside the accepted range.
    #[error("Invalid encryption secret")]
    InvalidEncryptionSecret,

    /// The referenced stream is not registered in this session.
    #[error("Unknown stream")]
    UnknownStream,

    /// The referenced publisher is not owned by this session.
    #[error("Unknown publisher")]
    UnknownPublisher,

    /// The referenced subscriber is not owned by this session.
    #[error("Unknown subscriber")]
    UnknownSubscriber,

    /// A publisher with this ID is already publishing.
    #[error("Publisher already publishing")]
    DuplicatePublisher,

    /// A subscriber with this ID is already subscribed.
    #[error("Subscriber already subscribed")]
    DuplicateSubscriber,
}

/// Failure reported by a [`Transport`](crate::transport::Transport) when a
/// request could not be handed off.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The underlying network session is unavailable.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// The request was rejected by the media/signaling engine.
    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl SessionError {
    /// Returns the numeric error code for this error.
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            SessionError::InvalidArgument(_) => 1,  // INVALID_ARGUMENT
            SessionError::NotConnected { .. } => 2, // NOT_CONNECTED
            SessionError::PermissionDenied(_) => 3, // PERMISSION_DENIED
            SessionError::TransportFailure(_) => 4, // TRANSPORT_FAILURE
            SessionError::Internal(_) => 5,         // INTERNAL_ERROR
        }
    }

    /// Whether this error is reported at the call site rather than through
    /// the observer channel.
    #[must_use]
    pub fn is_synchronous(&self) -> bool {
        !matches!(self, SessionError::TransportFailure(_))
    }

    /// Short label for metrics (bounded cardinality).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::InvalidArgument(_) => "invalid_argument",
            SessionError::NotConnected { .. } => "not_connected",
            SessionError::PermissionDenied(_) => "permission_denied",
            SessionError::TransportFailure(_) => "transport_failure",
            SessionError::Internal(_) => "internal",
        }
    }
}

impl From<InvalidArgumentError> for SessionError {
    fn from(err: InvalidArgumentError) -> Self {
        SessionError::InvalidArgument(err)
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        SessionError::TransportFailure(err.to_string())
    }
}
