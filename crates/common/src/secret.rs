//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Session credentials
//! and end-to-end encryption secrets are held in these types so that a derived
//! `Debug` on any struct carrying them prints a redacted placeholder.
//!
//! # Example
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct ConnectParams {
//!     session_id: String,
//!     credential: SecretString,  // Safe: Debug shows "[REDACTED]"
//! }
//!
//! let params = ConnectParams {
//!     session_id: "1_MX4xMjM0NX4".to_string(),
//!     credential: SecretString::from("T1==cGFydG5lcl9pZD0"),
//! };
//!
//! println!("{:?}", params);
//!
//! // Reading the value requires an explicit call
//! let credential: &str = params.credential.expose_secret();
//! ```
//!
//! # Usage Guidelines
//!
//! Use `SecretString` for:
//! - Session credentials (tokens)
//! - End-to-end encryption secrets
//! - TURN server credentials

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretString};
