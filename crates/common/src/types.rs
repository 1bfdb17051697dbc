//! Identifier newtypes shared by the session client crates.
//!
//! Session, connection, stream and archive identifiers are opaque strings
//! assigned by the signaling backend. Publisher and subscriber identifiers are
//! generated locally to track media objects owned by this client.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a logical multi-party session.
    SessionId
);

string_id!(
    /// Identifier of one participant's presence in a session.
    ConnectionId
);

string_id!(
    /// Identifier of a published audio/video stream.
    StreamId
);

string_id!(
    /// Identifier of a session recording.
    ArchiveId
);

string_id!(
    /// Identifier of a publisher owned by this client.
    PublisherId
);

string_id!(
    /// Identifier of a subscriber owned by this client.
    SubscriberId
);

impl PublisherId {
    /// Create a new random publisher ID
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("pub-{}", Uuid::new_v4()))
    }
}

impl SubscriberId {
    /// Create a new random subscriber ID
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("sub-{}", Uuid::new_v4()))
    }
}
