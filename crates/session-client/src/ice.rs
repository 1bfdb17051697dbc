//! ICE/TURN policy resolver.
//!
//! Holds the custom TURN servers and candidate policy the media transport may
//! use. The configuration is snapshotted into the connect request; changes made
//! after a connect only apply to the next connect.

use crate::errors::InvalidArgumentError;
use common::secret::{ExposeSecret, SecretString};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;
use url::Url;

/// Default maximum number of custom TURN servers.
pub const DEFAULT_MAX_TURN_SERVERS: usize = 5;

/// URL schemes accepted for custom ICE servers.
const ICE_URL_SCHEMES: [&str; 4] = ["turn", "turns", "stun", "stuns"];

/// Whether to use only custom TURN servers or custom plus platform defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeServers {
    /// Platform TURN servers and any custom servers.
    #[default]
    All,
    /// Custom TURN servers only.
    Custom,
}

/// Which ICE candidate types the transport may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportPolicy {
    /// Host, server-reflexive and relay candidates.
    #[default]
    All,
    /// Relay (TURN) candidates only.
    Relay,
}

/// Candidate policy settings that can be changed as a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IcePolicy {
    /// Custom-only or custom-plus-default servers.
    pub include_servers: IncludeServers,
    /// Candidate types allowed.
    pub transport_policy: TransportPolicy,
    /// Suppress same-network host candidates.
    pub filter_out_lan_candidates: bool,
}

/// A custom TURN server descriptor.
#[derive(Debug, Clone)]
pub struct TurnServer {
    /// Server URL (`turn:`, `turns:`, `stun:` or `stuns:`).
    pub turn_url: String,
    /// Username for the server.
    pub username: String,
    /// Credential for the server.
    pub credential: SecretString,
}

impl Serialize for TurnServer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TurnServer", 3)?;
        state.serialize_field("turn_url", &self.turn_url)?;
        state.serialize_field("username", &self.username)?;
        state.serialize_field("credential", self.credential.expose_secret())?;
        state.end()
    }
}

/// Resolved ICE configuration handed to the transport at connect time.
#[derive(Debug, Clone, Serialize)]
pub struct IceConfig {
    custom_servers: Vec<TurnServer>,
    policy: IcePolicy,
    max_servers: usize,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURN_SERVERS)
    }
}

impl IceConfig {
    /// Create an empty configuration allowing up to `max_servers` custom servers.
    #[must_use]
    pub fn new(max_servers: usize) -> Self {
        Self {
            custom_servers: Vec::new(),
            policy: IcePolicy::default(),
            max_servers,
        }
    }

    /// Add a custom TURN server.
    ///
    /// Checks run in order (URL, credentials, limit) and nothing is mutated on
    /// failure.
    ///
    /// # Errors
    ///
    /// - [`InvalidArgumentError::InvalidTurnUrl`] if the URL is malformed
    /// - [`InvalidArgumentError::EmptyTurnCredential`] if user or credential is empty
    /// - [`InvalidArgumentError::TurnServerLimitExceeded`] if the list is full
    pub fn add_turn_server(
        &mut self,
        turn_url: &str,
        username: &str,
        credential: &str,
    ) -> Result<(), InvalidArgumentError> {
        if !is_valid_ice_url(turn_url) {
            return Err(InvalidArgumentError::InvalidTurnUrl);
        }

        if username.is_empty() || credential.is_empty() {
            return Err(InvalidArgumentError::EmptyTurnCredential);
        }

        if self.custom_servers.len() >= self.max_servers {
            return Err(InvalidArgumentError::TurnServerLimitExceeded {
                max: self.max_servers,
            });
        }

        self.custom_servers.push(TurnServer {
            turn_url: turn_url.to_string(),
            username: username.to_string(),
            credential: SecretString::from(credential),
        });

        debug!(
            target: "session.ice",
            servers = self.custom_servers.len(),
            max = self.max_servers,
            "Custom TURN server added"
        );

        Ok(())
    }

    /// Replace the candidate policy.
    pub fn set_policy(&mut self, policy: IcePolicy) {
        self.policy = policy;
    }

    /// Custom servers in insertion order.
    #[must_use]
    pub fn custom_servers(&self) -> &[TurnServer] {
        &self.custom_servers
    }

    /// Current candidate policy.
    #[must_use]
    pub fn policy(&self) -> IcePolicy {
        self.policy
    }

    /// Maximum number of custom servers.
    #[must_use]
    pub fn max_servers(&self) -> usize {
        self.max_servers
    }
}

/// `turn:host:port` has no authority, so the target lives in the path.
fn is_valid_ice_url(raw: &str) -> bool {
    if raw.chars().any(char::is_whitespace) {
        return false;
    }

    let Ok(parsed) = Url::parse(raw) else {
        return false;
    };

    if !ICE_URL_SCHEMES.contains(&parsed.scheme()) {
        return false;
    }

    let target = parsed.host_str().unwrap_or_else(|| parsed.path());
    !target.is_empty() && !target.starts_with(':')
}
