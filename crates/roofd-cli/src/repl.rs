//! REPL – interactive session for the `roof` client.
//!
//! Each line is a command in the same form as the one-shot arguments
//! (`open`, `heartbeat enable 60`, ...).  `help` lists them; `quit` or
//! `exit` leaves.

use colored::Colorize;
use std::io::{self, BufRead, Write};

use roofd_server::RoofClient;
use tokio::runtime::Runtime;

use crate::commands::{parse_command, session_help};
use crate::render;

/// What the session should do with one input line.
#[derive(Debug, PartialEq)]
enum Action {
    Skip,
    Help,
    Quit,
    Send(roofd_types::Command),
    Invalid(String),
}

fn interpret(line: &str) -> Action {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [] => Action::Skip,
        ["help"] => Action::Help,
        ["quit" | "exit"] => Action::Quit,
        _ => match parse_command(&words) {
            Ok(command) => Action::Send(command),
            Err(e) => Action::Invalid(e),
        },
    }
}

/// Run the interactive session until EOF or `quit`.
///
/// Returns the code of the last command sent (0 if none).
pub fn run(runtime: &Runtime, client: &RoofClient) -> i32 {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut last_code = 0;

    println!("Connected to roof daemon at {}. Type {} for commands.", client.addr().to_string().bold(), "help".bold().cyan());

    loop {
        print!("{} ", "roof>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        match interpret(&line) {
            Action::Skip => {}
            Action::Help => println!("{}", session_help()),
            Action::Quit => break,
            Action::Invalid(e) => println!("{} Type {} for available commands.", e.red(), "help".bold()),
            Action::Send(command) => {
                let response = runtime.block_on(client.send(&command));
                last_code = response.result.code;
                println!("{}", render::response_text(&response));
            }
        }
    }
    last_code
}
