//! Command-line grammar of the `roof` client.
//!
//! ```text
//! roof [--addr HOST:PORT] open | close | stop | status
//! roof [--addr HOST:PORT] heartbeat enable SECONDS | refresh | disable
//! roof [--addr HOST:PORT] engineering enable | disable
//! ```
//!
//! With no command the client starts an interactive session, whose lines use
//! the same words (see [`parse_command`]).

use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use roofd_types::Command;

/// Daemon address used when neither `--addr` nor `ROOF_ADDR` is given.
pub const DEFAULT_ADDR: &str = "127.0.0.1:9030";

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    name = "roof",
    version,
    about = "Operator client for the rolling roof daemon",
    after_help = "With no command an interactive session is started."
)]
pub struct Cli {
    /// Daemon address
    #[arg(long, env = "ROOF_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: SocketAddr,

    #[command(subcommand)]
    pub command: Option<RoofCommand>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum RoofCommand {
    /// Open the roof
    Open,
    /// Close the roof
    Close,
    /// Stop the roof motion
    Stop,
    /// Print the roof status
    Status,
    /// Arm, refresh or disarm the heartbeat
    Heartbeat {
        #[command(subcommand)]
        action: HeartbeatAction,
    },
    /// Toggle engineering mode
    Engineering {
        #[command(subcommand)]
        action: EngineeringAction,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum HeartbeatAction {
    /// Arm the heartbeat (0 < seconds < 240)
    Enable {
        #[arg(allow_negative_numbers = true)]
        seconds: f64,
    },
    /// Push the heartbeat deadline out
    #[command(alias = "ping")]
    Refresh,
    /// Disarm the heartbeat
    Disable,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineeringAction {
    Enable,
    Disable,
}

impl From<RoofCommand> for Command {
    fn from(command: RoofCommand) -> Self {
        match command {
            RoofCommand::Open => Command::Open,
            RoofCommand::Close => Command::Close,
            RoofCommand::Stop => Command::Stop,
            RoofCommand::Status => Command::StatusQuery,
            RoofCommand::Heartbeat { action } => match action {
                HeartbeatAction::Enable { seconds } => Command::HeartbeatEnable { timeout: seconds },
                HeartbeatAction::Refresh => Command::HeartbeatRefresh,
                HeartbeatAction::Disable => Command::HeartbeatDisable,
            },
            RoofCommand::Engineering { action } => match action {
                EngineeringAction::Enable => Command::EngineeringEnable,
                EngineeringAction::Disable => Command::EngineeringDisable,
            },
        }
    }
}

/// Parse a command typed in the interactive session.
pub fn parse_command(words: &[&str]) -> Result<Command, String> {
    match words {
        ["open"] => Ok(Command::Open),
        ["close"] => Ok(Command::Close),
        ["stop"] => Ok(Command::Stop),
        ["status"] => Ok(Command::StatusQuery),
        ["heartbeat", "enable", seconds] => {
            let timeout = seconds
                .parse::<f64>()
                .map_err(|_| format!("invalid heartbeat timeout '{seconds}'"))?;
            Ok(Command::HeartbeatEnable { timeout })
        }
        ["heartbeat", "refresh" | "ping"] => Ok(Command::HeartbeatRefresh),
        ["heartbeat", "disable"] => Ok(Command::HeartbeatDisable),
        ["engineering", "enable"] => Ok(Command::EngineeringEnable),
        ["engineering", "disable"] => Ok(Command::EngineeringDisable),
        _ => Err(format!("unknown command '{}'", words.join(" "))),
    }
}

/// Help text of the interactive session.
pub fn session_help() -> &'static str {
    "commands:\n  \
       open                        open the roof\n  \
       close                       close the roof\n  \
       stop                        stop the roof motion\n  \
       status                      print the roof status\n  \
       heartbeat enable <seconds>  arm the heartbeat (0 < seconds < 240)\n  \
       heartbeat refresh           push the heartbeat deadline out\n  \
       heartbeat disable           disarm the heartbeat\n  \
       engineering enable|disable  toggle engineering mode\n  \
       quit                        leave the session"
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("roof").chain(args.iter().copied()))
    }

    #[test]
    fn argument_definitions_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn subcommands_map_to_commands() {
        let cases = [
            (vec!["open"], Command::Open),
            (vec!["status"], Command::StatusQuery),
            (vec!["heartbeat", "enable", "90"], Command::HeartbeatEnable { timeout: 90.0 }),
            (vec!["heartbeat", "ping"], Command::HeartbeatRefresh),
            (vec!["engineering", "disable"], Command::EngineeringDisable),
        ];
        for (args, expected) in cases {
            let command = parse(&args).unwrap().command.map(Command::from);
            assert_eq!(command, Some(expected), "{args:?}");
        }
    }

    #[test]
    fn negative_timeout_reaches_the_daemon() {
        let command = parse(&["heartbeat", "enable", "-5"]).unwrap().command.map(Command::from);
        assert_eq!(command, Some(Command::HeartbeatEnable { timeout: -5.0 }));
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(parse(&["launch"]).is_err());
        assert!(parse(&["heartbeat", "enable"]).is_err());
        assert!(parse(&["heartbeat", "enable", "soon"]).is_err());
        assert!(parse(&["--addr", "roof", "open"]).is_err());
    }

    #[test]
    fn addr_flag_and_interactive_default() {
        let cli = parse(&["--addr", "10.2.6.101:9030", "close"]).unwrap();
        assert_eq!(cli.addr.to_string(), "10.2.6.101:9030");
        assert_eq!(cli.command, Some(RoofCommand::Close));

        let cli = parse(&["--addr", "127.0.0.1:9030"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn session_lines() {
        assert_eq!(parse_command(&["open"]), Ok(Command::Open));
        assert_eq!(
            parse_command(&["heartbeat", "enable", "45"]),
            Ok(Command::HeartbeatEnable { timeout: 45.0 })
        );
        assert!(parse_command(&["launch"]).is_err());
        assert!(parse_command(&["heartbeat", "enable", "soon"]).is_err());
    }
}
