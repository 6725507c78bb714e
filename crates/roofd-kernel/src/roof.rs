//! [`RoofMachine`] – the logical roof state machine.
//!
//! ```text
//! Closed ──open──► Opening ──opened──► Open
//!   ▲                 │                  │
//!   │              partial /           close
//!   │          timeout / abort           │
//! closed              ▼                  ▼
//!   └──────────── Closing ◄──close── PartiallyOpen ──open──► Opening
//!                     │                  ▲
//!                     └─ partial / ... ──┘
//! ```
//!
//! A motion is never marked complete without the motor's confirmation: a
//! missing, mismatched or partial report leaves the roof `PartiallyOpen`.

use roofd_hal::{MotionReport, MotorCommand};
use roofd_types::{CommandStatus, RoofState};

/// Direction of a requested motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Open,
    Close,
}

impl Motion {
    /// State held while the motion is in flight.
    pub const fn transient(self) -> RoofState {
        match self {
            Motion::Open => RoofState::Opening,
            Motion::Close => RoofState::Closing,
        }
    }

    /// State reached when the motor confirms completion.
    pub const fn target(self) -> RoofState {
        match self {
            Motion::Open => RoofState::Open,
            Motion::Close => RoofState::Closed,
        }
    }

    pub const fn motor_command(self) -> MotorCommand {
        match self {
            Motion::Open => MotorCommand::Open,
            Motion::Close => MotorCommand::Close,
        }
    }

    const fn confirmation(self) -> MotionReport {
        match self {
            Motion::Open => MotionReport::Opened,
            Motion::Close => MotionReport::Closed,
        }
    }
}

/// Outcome of asking the machine to start a motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    /// The roof is already at the requested end state; nothing to do.
    AlreadyThere,
    /// The machine moved to the transient state; the motor must be commanded.
    Started,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoofMachine {
    state: RoofState,
}

impl RoofMachine {
    /// Start from a known (or unknown: `PartiallyOpen`) position.
    pub fn new(initial: RoofState) -> Self {
        Self { state: initial }
    }

    pub fn state(&self) -> RoofState {
        self.state
    }

    /// Try to start `motion`.
    ///
    /// # Errors
    ///
    /// [`CommandStatus::Blocked`] while another motion is in flight.
    pub fn begin(&mut self, motion: Motion) -> Result<Begin, CommandStatus> {
        if self.state.is_moving() {
            return Err(CommandStatus::Blocked);
        }
        if self.state == motion.target() {
            return Ok(Begin::AlreadyThere);
        }
        self.state = motion.transient();
        Ok(Begin::Started)
    }

    /// Resolve the in-flight `motion` with the motor's report, or `None` when
    /// it timed out, was aborted or the command could not be sent.
    ///
    /// Returns the resulting state.
    pub fn finish(&mut self, motion: Motion, report: Option<MotionReport>) -> RoofState {
        if self.state != motion.transient() {
            return self.state;
        }
        self.state = if report == Some(motion.confirmation()) {
            motion.target()
        } else {
            RoofState::PartiallyOpen
        };
        self.state
    }
}
