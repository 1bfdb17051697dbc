//! # Session Test Utilities
//!
//! Shared test utilities for the session client.
//!
//! ## Modules
//!
//! - `fixtures` - Pre-configured test data (streams, connections, credentials)
//! - `harness` - A session actor wired to a recording transport
//! - `recorder` - Observer that waits for and collects session events
//!
//! ## Usage
//!
//! ```rust,ignore
//! use session_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let mut session = TestSession::spawn().await.unwrap();
//!     let reporter = session.connect_as(Role::Publisher).await.unwrap();
//!
//!     reporter
//!         .report_stream_created(TestStream::new("stream-1").build())
//!         .await
//!         .unwrap();
//!
//!     session
//!         .events
//!         .wait_for(|e| matches!(e, SessionEvent::StreamCreated(_)))
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod fixtures;
pub mod harness;
pub mod recorder;

// Re-export commonly used items
pub use fixtures::*;
pub use harness::*;
pub use recorder::*;
