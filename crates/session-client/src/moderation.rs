//! Moderation controller: session-level forced-mute state.
//!
//! While force-mute is active every stream created afterwards starts with
//! audio muted, unless its ID is in the exclusion list. Deactivating only
//! affects future streams; streams already muted stay muted.

use common::types::StreamId;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Session-wide forced-mute state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ForceMuteState {
    /// New streams publish normally.
    #[default]
    Inactive,
    /// New streams start muted unless excluded.
    Active {
        /// Streams exempt from the mute.
        excluded: HashSet<StreamId>,
    },
}

impl ForceMuteState {
    /// Whether force-mute is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, ForceMuteState::Active { .. })
    }
}

/// Tracks forced-mute state for one session.
#[derive(Debug, Default)]
pub struct ModerationController {
    state: ForceMuteState,
}

impl ModerationController {
    /// Create a controller with force-mute inactive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate force-mute after a local `force_mute_all`. `None` excludes
    /// nothing, including the local client's own streams.
    pub fn activate(&mut self, excluded: Option<&[StreamId]>) {
        let excluded: HashSet<StreamId> = excluded.unwrap_or_default().iter().cloned().collect();
        debug!(
            target: "session.moderation",
            excluded = excluded.len(),
            "Force mute activated"
        );
        self.state = ForceMuteState::Active { excluded };
    }

    /// Clear force-mute. Returns `true` if it was active.
    pub fn deactivate(&mut self) -> bool {
        let was_active = self.state.is_active();
        self.state = ForceMuteState::Inactive;
        if was_active {
            debug!(target: "session.moderation", "Force mute deactivated");
        }
        was_active
    }

    /// Apply a mute-forced notification from the transport. Returns `true`
    /// if the active flag changed.
    pub fn apply_remote(&mut self, active: bool, excluded: Option<&[StreamId]>) -> bool {
        let was_active = self.state.is_active();
        if active {
            self.activate(excluded);
        } else {
            self.deactivate();
        }
        was_active != active
    }

    /// Whether a newly created stream must start with audio muted.
    #[must_use]
    pub fn should_start_muted(&self, stream_id: &StreamId) -> bool {
        match &self.state {
            ForceMuteState::Inactive => false,
            ForceMuteState::Active { excluded } => !excluded.contains(stream_id),
        }
    }

    /// Whether force-mute is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &ForceMuteState {
        &self.state
    }

    /// Drop all state (session teardown).
    pub fn reset(&mut self) {
        self.state = ForceMuteState::Inactive;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_by_default() {
        let moderation = ModerationController::new();
        assert!(!moderation.is_active());
        assert!(!moderation.should_start_muted(&StreamId::from("s1")));
    }

    #[test]
    fn test_activate_without_exclusions_mutes_every_new_stream() {
        let mut moderation = ModerationController::new();
        moderation.activate(None);
        assert!(moderation.should_start_muted(&StreamId::from("s1")));
        assert!(moderation.should_start_muted(&StreamId::from("local")));
    }

    #[test]
    fn test_excluded_streams_start_unmuted() {
        let mut moderation = ModerationController::new();
        let excluded = [StreamId::from("keep")];
        moderation.activate(Some(&excluded));

        assert!(!moderation.should_start_muted(&StreamId::from("keep")));
        assert!(moderation.should_start_muted(&StreamId::from("other")));
    }

    #[test]
    fn test_deactivate_stops_prospective_mute() {
        let mut moderation = ModerationController::new();
        moderation.activate(None);
        assert!(moderation.deactivate());
        assert!(!moderation.deactivate());
        assert!(!moderation.should_start_muted(&StreamId::from("s1")));
    }

    #[test]
    fn test_apply_remote_reports_flag_changes() {
        let mut moderation = ModerationController::new();
        assert!(moderation.apply_remote(true, None));
        // Re-activation with a new exclusion list replaces the list
        let excluded = [StreamId::from("s1")];
        assert!(!moderation.apply_remote(true, Some(&excluded)));
        assert!(!moderation.should_start_muted(&StreamId::from("s1")));

        assert!(moderation.apply_remote(false, None));
        assert!(!moderation.apply_remote(false, None));
        assert_eq!(moderation.state(), &ForceMuteState::Inactive);
    }

    #[test]
    fn test_state_serializes_tagged() {
        let mut moderation = ModerationController::new();
        moderation.activate(None);
        let json = serde_json::to_value(moderation.state()).unwrap();
        assert_eq!(json["state"], "active");
    }
}
