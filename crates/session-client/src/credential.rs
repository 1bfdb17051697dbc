//! Session credential format checks.
//!
//! Credentials are opaque to this layer; only their shape is checked before a
//! connect is handed to the transport. Parsing and verification belong to the
//! signaling backend.

use crate::errors::InvalidArgumentError;
use common::secret::{ExposeSecret, SecretString};

/// Maximum accepted credential length in bytes.
pub const MAX_CREDENTIAL_LENGTH: usize = 4096;

/// Validate the format of a session credential.
///
/// A credential must be non-empty, at most [`MAX_CREDENTIAL_LENGTH`] bytes, and
/// consist only of visible ASCII characters.
///
/// # Errors
///
/// Returns [`InvalidArgumentError::MalformedCredential`] when any check fails.
pub fn validate_credential(credential: &SecretString) -> Result<(), InvalidArgumentError> {
    let raw = credential.expose_secret();

    if raw.is_empty() || raw.len() > MAX_CREDENTIAL_LENGTH {
        return Err(InvalidArgumentError::MalformedCredential);
    }

    if !raw.bytes().all(|b| b.is_ascii_graphic()) {
        return Err(InvalidArgumentError::MalformedCredential);
    }

    Ok(())
}
