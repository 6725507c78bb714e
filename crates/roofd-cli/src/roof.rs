//! `roof` – operator client for the roof daemon
//!
//! Sends one command given on the command line, or starts an interactive
//! session when none is given.  The process exit status is the command's
//! result code: 0 on success, the daemon's error code otherwise, `-100`
//! when interrupted with Ctrl-C and `-101` when the daemon cannot be reached.

mod commands;
mod render;
mod repl;

use clap::Parser;
use colored::Colorize;
use roofd_server::RoofClient;
use roofd_types::{Command, CommandStatus};
use tracing::warn;

use crate::commands::Cli;

fn main() {
    // Client output is for humans; only warnings and errors are logged.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    if let Err(e) = ctrlc::set_handler(|| {
        println!();
        println!("{}", CommandStatus::UserTerminated.message().red());
        std::process::exit(CommandStatus::UserTerminated.code());
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler");
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = if e.use_stderr() { CommandStatus::Failed.code() } else { 0 };
            std::process::exit(code);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}: {e}", "Failed to start async runtime".red());
            std::process::exit(CommandStatus::CommunicationFailure.code());
        }
    };
    let client = RoofClient::new(cli.addr);

    let code = match cli.command {
        None => repl::run(&runtime, &client),
        Some(command) => {
            let response = runtime.block_on(client.send(&Command::from(command)));
            println!("{}", render::response_text(&response));
            response.result.code
        }
    };
    std::process::exit(code);
}
