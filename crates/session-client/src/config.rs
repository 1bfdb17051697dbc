//! Session client configuration.
//!
//! Configuration is loaded from environment variables or built in code with
//! [`Config::new`]. The proxy URL is redacted in Debug output.

use crate::ice::DEFAULT_MAX_TURN_SERVERS;
use crate::signal::{DEFAULT_MAX_SIGNAL_PAYLOAD_BYTES, DEFAULT_MAX_SIGNAL_TYPE_LENGTH};
use common::types::SessionId;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Default session actor mailbox capacity.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 500;

/// Connection settings handed to the transport at connect time.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionSettings {
    /// Suppress connection-created/destroyed observer events. The registry is
    /// still updated.
    pub connection_events_suppressed: bool,
    /// Route media only through allow-listed server IPs.
    pub ip_allow_list: bool,
    /// Proxy for signaling and media traffic.
    pub proxy_url: Option<Url>,
    /// Use a single peer connection for all subscribers.
    pub single_peer_connection: bool,
    /// Let the backend migrate the session between servers.
    pub session_migration: bool,
}

/// Proxy URLs may embed credentials.
impl fmt::Debug for SessionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSettings")
            .field(
                "connection_events_suppressed",
                &self.connection_events_suppressed,
            )
            .field("ip_allow_list", &self.ip_allow_list)
            .field(
                "proxy_url",
                &self.proxy_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("single_peer_connection", &self.single_peer_connection)
            .field("session_migration", &self.session_migration)
            .finish()
    }
}

/// Session client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Application key the session belongs to.
    pub api_key: String,
    /// Session to join.
    pub session_id: SessionId,
    /// Connection settings.
    pub settings: SessionSettings,
    /// Maximum number of custom TURN servers (default: 5).
    pub max_turn_servers: usize,
    /// Maximum signal type length in characters (default: 128).
    pub signal_max_type_length: usize,
    /// Maximum signal payload size in bytes (default: 8192).
    pub signal_max_payload_bytes: usize,
    /// Session actor mailbox capacity (default: 500).
    pub mailbox_capacity: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Configuration with default limits and settings.
    #[must_use]
    pub fn new(api_key: impl Into<String>, session_id: impl Into<SessionId>) -> Self {
        Self {
            api_key: api_key.into(),
            session_id: session_id.into(),
            settings: SessionSettings::default(),
            max_turn_servers: DEFAULT_MAX_TURN_SERVERS,
            signal_max_type_length: DEFAULT_MAX_SIGNAL_TYPE_LENGTH,
            signal_max_payload_bytes: DEFAULT_MAX_SIGNAL_PAYLOAD_BYTES,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// See [`Config::from_vars`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingEnvVar`] if `SESSION_API_KEY` or `SESSION_ID`
    ///   is absent or empty
    /// - [`ConfigError::InvalidValue`] for unparsable values, zero limits or
    ///   a malformed proxy URL
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let api_key = required(vars, "SESSION_API_KEY")?;
        let session_id = SessionId::new(required(vars, "SESSION_ID")?);

        let proxy_url = vars
            .get("SESSION_PROXY_URL")
            .filter(|s| !s.is_empty())
            .map(|s| {
                Url::parse(s).map_err(|e| {
                    ConfigError::InvalidValue(format!("SESSION_PROXY_URL is not a valid URL: {e}"))
                })
            })
            .transpose()?;

        let settings = SessionSettings {
            connection_events_suppressed: flag(vars, "SESSION_CONNECTION_EVENTS_SUPPRESSED")?,
            ip_allow_list: flag(vars, "SESSION_IP_ALLOW_LIST")?,
            proxy_url,
            single_peer_connection: flag(vars, "SESSION_SINGLE_PEER_CONNECTION")?,
            session_migration: flag(vars, "SESSION_MIGRATION")?,
        };

        Ok(Config {
            api_key,
            session_id,
            settings,
            max_turn_servers: limit(vars, "SESSION_MAX_TURN_SERVERS", DEFAULT_MAX_TURN_SERVERS)?,
            signal_max_type_length: limit(
                vars,
                "SESSION_SIGNAL_MAX_TYPE_LENGTH",
                DEFAULT_MAX_SIGNAL_TYPE_LENGTH,
            )?,
            signal_max_payload_bytes: limit(
                vars,
                "SESSION_SIGNAL_MAX_PAYLOAD_BYTES",
                DEFAULT_MAX_SIGNAL_PAYLOAD_BYTES,
            )?,
            mailbox_capacity: limit(vars, "SESSION_MAILBOX_CAPACITY", DEFAULT_MAILBOX_CAPACITY)?,
        })
    }
}

fn required(vars: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    vars.get(key)
        .filter(|s| !s.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn limit(vars: &HashMap<String, String>, key: &str, default: usize) -> Result<usize, ConfigError> {
    let Some(raw) = vars.get(key) else {
        return Ok(default);
    };

    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::InvalidValue(format!(
            "{key} must be greater than zero"
        ))),
        Ok(value) => Ok(value),
        Err(e) => Err(ConfigError::InvalidValue(format!(
            "{key} must be a positive integer: {e}"
        ))),
    }
}

fn flag(vars: &HashMap<String, String>, key: &str) -> Result<bool, ConfigError> {
    let Some(raw) = vars.get(key) else {
        return Ok(false);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue(format!(
            "{key} must be a boolean, got '{other}'"
        ))),
    }
}
