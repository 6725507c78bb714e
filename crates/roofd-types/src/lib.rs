//! `roofd-types` – protocol contract shared by the roof daemon and its clients.
//!
//! - [`status`] – [`CommandStatus`] result codes and the code-to-message map.
//! - [`state`] – [`RoofState`] / [`HeartbeatState`] with their label and
//!   emphasis tables.
//! - [`protocol`] – [`Command`], [`CommandResult`], [`Response`] and
//!   [`StatusReport`] as exchanged over the network.
//!
//! Everything here is immutable data and safe to share between threads.

pub mod protocol;
pub mod state;
pub mod status;

use thiserror::Error;

pub use protocol::{Command, CommandResult, Response, StatusReport};
pub use state::{Color, Emphasis, HeartbeatState, RoofState, UNKNOWN_LABEL};
pub use status::{message, CommandStatus};

/// Infrastructure error spanning the motor driver, the network and the wire
/// format.  Command outcomes are [`CommandStatus`] values, not errors.
#[derive(Error, Debug)]
pub enum RoofError {
    #[error("Motor controller fault on {component}: {details}")]
    Driver { component: String, details: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}
