//! [`CommandStatus`] – numeric result codes shared by the daemon and its
//! clients.
//!
//! The integer values are the wire-level result of every command and must
//! never be renumbered.  Non-negative codes are produced by the daemon;
//! negative codes are reserved for failures that only the client side can
//! observe (the operator pressing Ctrl-C, or the daemon being unreachable).

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Result code of a roof command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
#[repr(i32)]
pub enum CommandStatus {
    Succeeded = 0,
    Failed = 1,
    /// Another motion command is already in flight.
    Blocked = 2,
    HeartbeatTimedOut = 3,
    /// The heartbeat watchdog is closing the roof.
    HeartbeatCloseInProgress = 4,
    HeartbeatInvalidTimeout = 5,
    EngineeringModeRequiresHeartbeatDisabled = 6,
    EngineeringModeActive = 7,
    InvalidControlIP = 10,
    /// Client-local: the operator interrupted the command.
    UserTerminated = -100,
    /// Client-local: the daemon could not be reached.
    CommunicationFailure = -101,
}

/// Every defined status, in code order.
pub const ALL_STATUSES: [CommandStatus; 11] = [
    CommandStatus::CommunicationFailure,
    CommandStatus::UserTerminated,
    CommandStatus::Succeeded,
    CommandStatus::Failed,
    CommandStatus::Blocked,
    CommandStatus::HeartbeatTimedOut,
    CommandStatus::HeartbeatCloseInProgress,
    CommandStatus::HeartbeatInvalidTimeout,
    CommandStatus::EngineeringModeRequiresHeartbeatDisabled,
    CommandStatus::EngineeringModeActive,
    CommandStatus::InvalidControlIP,
];

impl CommandStatus {
    /// The stable wire value of this status.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Look up the status for a wire value.  Returns `None` for codes that
    /// are not part of the protocol.
    pub fn from_code(code: i32) -> Option<Self> {
        ALL_STATUSES.iter().copied().find(|s| s.code() == code)
    }

    /// Fixed human-readable description of this status.
    pub const fn message(self) -> &'static str {
        match self {
            CommandStatus::Succeeded => "command succeeded",
            CommandStatus::Failed => "error: command failed",
            CommandStatus::Blocked => "error: another command is already running",
            CommandStatus::InvalidControlIP => "error: command not accepted from this IP",
            CommandStatus::HeartbeatTimedOut => "error: heartbeat has timed out",
            CommandStatus::HeartbeatCloseInProgress => {
                "error: heartbeat timeout is closing the roof"
            }
            CommandStatus::HeartbeatInvalidTimeout => {
                "error: heartbeat timeout must be less than 240s"
            }
            CommandStatus::EngineeringModeRequiresHeartbeatDisabled => {
                "error: heartbeat must be disabled before enabling engineering mode"
            }
            CommandStatus::EngineeringModeActive => "error: roof is in engineering mode",
            CommandStatus::UserTerminated => "error: terminated by user",
            CommandStatus::CommunicationFailure => {
                "error: unable to communicate with roof daemon"
            }
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, CommandStatus::Succeeded)
    }

    /// `true` for codes the daemon never produces.
    pub const fn is_client_local(self) -> bool {
        self.code() < 0
    }
}

/// Human-readable message for any wire code.
///
/// Never fails: codes outside the protocol produce a generic
/// `"error: Unknown error code N"` message.
pub fn message(code: i32) -> Cow<'static, str> {
    match CommandStatus::from_code(code) {
        Some(status) => Cow::Borrowed(status.message()),
        None => Cow::Owned(format!("error: Unknown error code {code}")),
    }
}

impl From<CommandStatus> for i32 {
    fn from(status: CommandStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i32> for CommandStatus {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        CommandStatus::from_code(code).ok_or_else(|| format!("unknown status code {code}"))
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
