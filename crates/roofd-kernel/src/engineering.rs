//! [`EngineeringMode`] – maintenance override that excludes the heartbeat.
//!
//! Engineering mode may only be entered while the heartbeat is
//! [`HeartbeatState::Disabled`], so the deadman switch is never suppressed
//! while it is armed or acting.  While the mode is on, ordinary open/close
//! commands and heartbeat arming are refused with
//! [`CommandStatus::EngineeringModeActive`].

use roofd_types::{CommandStatus, HeartbeatState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineeringMode {
    enabled: bool,
}

impl EngineeringMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enter engineering mode.
    ///
    /// # Errors
    ///
    /// [`CommandStatus::EngineeringModeRequiresHeartbeatDisabled`] unless
    /// `heartbeat` is `Disabled`.  State is unchanged on error.
    pub fn enable(&mut self, heartbeat: HeartbeatState) -> Result<(), CommandStatus> {
        if heartbeat != HeartbeatState::Disabled {
            return Err(CommandStatus::EngineeringModeRequiresHeartbeatDisabled);
        }
        self.enabled = true;
        Ok(())
    }

    /// Leave engineering mode.  Always permitted; the heartbeat stays
    /// disabled until a client arms it again.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Refuse the command when engineering mode is on.
    pub fn check(&self) -> Result<(), CommandStatus> {
        if self.enabled {
            Err(CommandStatus::EngineeringModeActive)
        } else {
            Ok(())
        }
    }
}
