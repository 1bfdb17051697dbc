//! Capability gate for publish/subscribe/force-mute permissions.
//!
//! Capabilities are granted once per successful connect from the role carried
//! by the session credential. Until then every gated call is rejected locally.

use crate::errors::SessionError;
use serde::{Deserialize, Serialize};

/// Role granted by the session credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May subscribe only.
    Subscriber,
    /// May publish and subscribe.
    Publisher,
    /// May publish, subscribe and force other participants to mute.
    Moderator,
}

/// Snapshot of what the local client may do in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Whether the client may publish streams.
    pub can_publish: bool,
    /// Whether the client may subscribe to streams.
    pub can_subscribe: bool,
    /// Whether the client may force other streams to mute audio.
    pub can_force_mute: bool,
}

impl Capabilities {
    /// Capabilities granted to a role.
    #[must_use]
    pub const fn for_role(role: Role) -> Self {
        match role {
            Role::Subscriber => Self {
                can_publish: false,
                can_subscribe: true,
                can_force_mute: false,
            },
            Role::Publisher => Self {
                can_publish: true,
                can_subscribe: true,
                can_force_mute: false,
            },
            Role::Moderator => Self {
                can_publish: true,
                can_subscribe: true,
                can_force_mute: true,
            },
        }
    }
}

impl From<Role> for Capabilities {
    fn from(role: Role) -> Self {
        Self::for_role(role)
    }
}

/// Holds the granted capabilities and answers permission checks.
#[derive(Debug, Default)]
pub struct CapabilityGate {
    granted: Option<Capabilities>,
}

impl CapabilityGate {
    /// Create a gate with nothing granted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant capabilities for the current connect. Returns `false` if
    /// capabilities were already granted (the first grant is kept).
    pub fn grant(&mut self, capabilities: Capabilities) -> bool {
        if self.granted.is_some() {
            return false;
        }
        self.granted = Some(capabilities);
        true
    }

    /// Currently granted capabilities, if any.
    #[must_use]
    pub fn granted(&self) -> Option<Capabilities> {
        self.granted
    }

    /// Forget the grant (session ended).
    pub fn revoke(&mut self) {
        self.granted = None;
    }

    /// Require the publish capability.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::PermissionDenied`] if not granted.
    pub fn require_publish(&self) -> Result<(), SessionError> {
        self.require(|c| c.can_publish, "publish")
    }

    /// Require the subscribe capability.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::PermissionDenied`] if not granted.
    pub fn require_subscribe(&self) -> Result<(), SessionError> {
        self.require(|c| c.can_subscribe, "subscribe")
    }

    /// Require the force-mute capability.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::PermissionDenied`] if not granted.
    pub fn require_force_mute(&self) -> Result<(), SessionError> {
        self.require(|c| c.can_force_mute, "force mute")
    }

    fn require(
        &self,
        check: impl Fn(&Capabilities) -> bool,
        action: &str,
    ) -> Result<(), SessionError> {
        match &self.granted {
            Some(caps) if check(caps) => Ok(()),
            Some(_) => Err(SessionError::PermissionDenied(format!(
                "Credential role does not allow {action}"
            ))),
            None => Err(SessionError::PermissionDenied(format!(
                "Capabilities not granted yet, cannot {action}"
            ))),
        }
    }
}
