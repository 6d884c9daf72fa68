use std::path::PathBuf;

use clap::Parser;

/// Pulse: terminal chat with live presence.
#[derive(Parser, Debug)]
#[command(name = "pulse-chat", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Name to chat as (overrides `chat.username`).
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Relay URL (overrides `relay.url`).
    #[arg(long)]
    pub relay: Option<String>,

    /// Use an in-process bus instead of a relay.
    #[arg(long)]
    pub offline: bool,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    pub print_config: bool,
}

pub fn parse() -> Args {
    Args::parse()
}

/// One line typed by the user.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Chat(String),
    Who,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Input::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Input::Chat(line.to_string());
        };
        match command.split_whitespace().next().unwrap_or("") {
            "who" => Input::Who,
            "help" => Input::Help,
            "quit" | "exit" => Input::Quit,
            other => Input::Unknown(other.to_string()),
        }
    }
}

pub const HELP: &str = "commands: /who  list online users, /quit  leave, /help  this text";
