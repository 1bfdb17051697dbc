//! Session actor.
//!
//! One `SessionActor` per session owns every piece of mutable state: the
//! connection status, entity registry, signal queue, moderation state and
//! ICE configuration. Callers talk to it through a cloneable
//! [`SessionHandle`]; the transport talks to it through the
//! [`TransportReporter`](crate::transport::TransportReporter) it receives at
//! connect time. Both feed the same mailbox, so intents and events are applied
//! strictly in arrival order on a single task.
//!
//! # Release
//!
//! Cancelling the handle's token, or dropping every handle, shuts the actor
//! down: owned publishers and subscribers are torn down and the transport is
//! asked to disconnect if a network session exists.

pub mod messages;
pub mod metrics;
pub mod session;

pub use messages::{SessionMessage, SessionState};
pub use metrics::{MailboxLevel, MailboxMonitor};
pub use session::{SessionActor, SessionHandle};
