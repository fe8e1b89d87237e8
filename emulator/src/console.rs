//! Line grammar for the emulator console.
//!
//! The verb is matched case-insensitively; arguments are whitespace separated
//! and parsed with `winnow` combinators.

use thiserror::Error;
use winnow::ascii::{dec_uint, space0, space1};
use winnow::combinator::{eof, opt, preceded, terminated};
use winnow::prelude::*;
use winnow::token::take_till;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    (
        "login",
        "login <user> <password>  - sign in and start tracking",
    ),
    (
        "logout",
        "logout                   - end the session and discard unsent steps",
    ),
    (
        "walk",
        "walk <strides>           - feed a steady walking gait to the sensor",
    ),
    (
        "shake",
        "shake <samples>          - feed continuous high-g samples",
    ),
    (
        "idle",
        "idle                     - drop queued motion so the sensor reads rest",
    ),
    ("sync", "sync                     - upload pending steps now"),
    (
        "refresh",
        "refresh                  - re-fetch the home dashboard",
    ),
    (
        "status",
        "status                   - show counters, sync totals and dashboard",
    ),
    (
        "history",
        "history [count]          - show recent telemetry events",
    ),
    (
        "help",
        "help [topic]             - show help for a command",
    ),
    ("exit", "exit                     - close the emulator"),
];

/// Number of telemetry records shown by a bare `history`.
pub const DEFAULT_HISTORY: usize = 10;

/// A parsed console line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConsoleCommand {
    Login { username: String, password: String },
    Logout,
    Walk(u32),
    Shake(u32),
    Idle,
    Sync,
    Refresh,
    Status,
    History(usize),
    Help(Option<String>),
    Exit,
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ConsoleError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`; type `help` for a list")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parses one console line.
///
/// # Errors
///
/// Returns [`ConsoleError::UnknownCommand`] for an unrecognised verb and
/// [`ConsoleError::Usage`] when the arguments do not fit the verb.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let mut input = line.trim();
    let verb = word
        .parse_next(&mut input)
        .map_err(|_| ConsoleError::Empty)?
        .to_ascii_lowercase();

    let parsed = match verb.as_str() {
        "login" => terminated((argument, argument), end)
            .map(|(username, password): (&str, &str)| ConsoleCommand::Login {
                username: username.to_owned(),
                password: password.to_owned(),
            })
            .parse_next(&mut input),
        "logout" => end.value(ConsoleCommand::Logout).parse_next(&mut input),
        "walk" => terminated(count, end)
            .map(ConsoleCommand::Walk)
            .parse_next(&mut input),
        "shake" => terminated(count, end)
            .map(ConsoleCommand::Shake)
            .parse_next(&mut input),
        "idle" => end.value(ConsoleCommand::Idle).parse_next(&mut input),
        "sync" => end.value(ConsoleCommand::Sync).parse_next(&mut input),
        "refresh" => end.value(ConsoleCommand::Refresh).parse_next(&mut input),
        "status" => end.value(ConsoleCommand::Status).parse_next(&mut input),
        "history" => terminated(opt(preceded(space1, dec_uint)), end)
            .map(|limit: Option<usize>| ConsoleCommand::History(limit.unwrap_or(DEFAULT_HISTORY)))
            .parse_next(&mut input),
        "help" => terminated(opt(argument), end)
            .map(|topic: Option<&str>| ConsoleCommand::Help(topic.map(str::to_ascii_lowercase)))
            .parse_next(&mut input),
        "exit" | "quit" => end.value(ConsoleCommand::Exit).parse_next(&mut input),
        _ => return Err(ConsoleError::UnknownCommand(verb)),
    };

    parsed.map_err(|_| ConsoleError::Usage(usage(&verb)))
}

/// Help line for `topic`, if there is one.
#[must_use]
pub fn help_topic(topic: &str) -> Option<&'static str> {
    HELP_TOPICS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(topic))
        .map(|(_, detail)| *detail)
}

/// Comma separated list of help topics.
#[must_use]
pub fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn usage(verb: &str) -> &'static str {
    let verb = if verb == "quit" { "exit" } else { verb };
    help_topic(verb).unwrap_or("")
}

fn word<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_till(1.., |c: char| c.is_ascii_whitespace()).parse_next(input)
}

fn argument<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    preceded(space1, word).parse_next(input)
}

fn count(input: &mut &str) -> ModalResult<u32> {
    preceded(space1, dec_uint).parse_next(input)
}

fn end(input: &mut &str) -> ModalResult<()> {
    (space0, eof).void().parse_next(input)
}
