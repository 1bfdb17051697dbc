//! Session Client Library
//!
//! Client-side session layer for real-time audio/video communication:
//!
//! - Connection lifecycle with automatic-reconnect awareness
//! - Registry of remote streams and connections
//! - Application signaling with queue-and-flush across reconnects
//! - Moderation (force mute) and capability gating by credential role
//! - ICE/TURN server configuration
//!
//! # Architecture
//!
//! ```text
//! SessionHandle (cloneable, caller side)
//! └── SessionActor (one per session, owns all state)
//!     ├── EntityRegistry, SignalDispatcher, ModerationController
//!     └── Arc<dyn Transport>
//!         └── TransportReporter (events back into the same mailbox)
//! ```
//!
//! The network session and media engine sit behind the [`transport::Transport`]
//! trait. A [`transport::loopback::LoopbackTransport`] is included for demos
//! and tests.
//!
//! # Modules
//!
//! - [`actors`] - Session actor and its handle
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error types with stable error codes
//! - [`events`] - Events delivered to observers
//! - [`transport`] - Transport boundary

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actors;
pub mod capabilities;
pub mod config;
pub mod credential;
pub mod entities;
pub mod errors;
pub mod events;
pub mod ice;
pub mod moderation;
pub mod observability;
pub mod registry;
pub mod signal;
pub mod state;
pub mod transport;

pub use actors::{SessionActor, SessionHandle, SessionState};
pub use capabilities::{Capabilities, Role};
pub use config::{Config, SessionSettings};
pub use entities::{Archive, Connection, Publisher, Stream, Subscriber, VideoType};
pub use errors::{InvalidArgumentError, SessionError, TransportError};
pub use events::{MuteForcedInfo, SessionEvent};
pub use ice::{IcePolicy, IncludeServers, TransportPolicy};
pub use state::ConnectionStatus;
