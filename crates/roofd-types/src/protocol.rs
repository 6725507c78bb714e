//! Command protocol: requests, results and the status report.
//!
//! On the wire every request and response is a single JSON object.  Requests
//! are tagged by their `"command"` field:
//!
//! ```json
//! {"command":"heartbeat-enable","timeout":60.0}
//! ```
//!
//! Responses carry the integer status code, its message, and a status report
//! for `status-query`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{HeartbeatState, RoofState};
use crate::status::{self, CommandStatus};

/// A command accepted by the roof daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Command {
    Open,
    Close,
    Stop,
    /// Arm the deadman switch; `timeout` is in seconds.
    HeartbeatEnable { timeout: f64 },
    HeartbeatRefresh,
    HeartbeatDisable,
    EngineeringEnable,
    EngineeringDisable,
    StatusQuery,
}

impl Command {
    /// Protocol name of the command, as used in the `"command"` tag.
    pub const fn name(&self) -> &'static str {
        match self {
            Command::Open => "open",
            Command::Close => "close",
            Command::Stop => "stop",
            Command::HeartbeatEnable { .. } => "heartbeat-enable",
            Command::HeartbeatRefresh => "heartbeat-refresh",
            Command::HeartbeatDisable => "heartbeat-disable",
            Command::EngineeringEnable => "engineering-enable",
            Command::EngineeringDisable => "engineering-disable",
            Command::StatusQuery => "status-query",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::HeartbeatEnable { timeout } => write!(f, "{} ({timeout}s)", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}

/// Numeric status code plus its display message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub code: i32,
    pub message: String,
}

impl CommandResult {
    /// Build a result for an arbitrary wire code, deriving the message.
    pub fn from_code(code: i32) -> Self {
        Self {
            code,
            message: status::message(code).into_owned(),
        }
    }

    /// The typed status, or `None` for a code outside the protocol.
    pub fn status(&self) -> Option<CommandStatus> {
        CommandStatus::from_code(self.code)
    }

    pub fn is_success(&self) -> bool {
        self.code == CommandStatus::Succeeded.code()
    }
}

impl From<CommandStatus> for CommandResult {
    fn from(status: CommandStatus) -> Self {
        Self {
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

/// Snapshot of the daemon state returned by `status-query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub date: DateTime<Utc>,
    pub roof: RoofState,
    pub heartbeat: HeartbeatState,
    /// Time at which the heartbeat expires; only set while `Active`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_until: Option<DateTime<Utc>>,
    /// Timeout most recently armed with `heartbeat-enable`, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_timeout: Option<f64>,
    pub engineering_mode: bool,
}

/// A full response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(flatten)]
    pub result: CommandResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusReport>,
}

impl Response {
    pub fn with_status(report: StatusReport) -> Self {
        Self {
            result: CommandStatus::Succeeded.into(),
            status: Some(report),
        }
    }
}

impl From<CommandStatus> for Response {
    fn from(status: CommandStatus) -> Self {
        Self {
            result: status.into(),
            status: None,
        }
    }
}
