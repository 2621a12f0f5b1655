//! Input line parsing.

use std::path::PathBuf;

use thiserror::Error;

/// A line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Open the conversation with a peer, by id or display name.
    Select(String),
    /// List online and offline peers.
    Who,
    /// End the session.
    Logout,
    /// Leave without logging out.
    Quit,
    /// Show the command list.
    Help,
    /// Send text to the active peer.
    Say(String),
    /// Send a local file to the active peer.
    File(PathBuf),
    /// Blank line.
    Nothing,
}

/// Input that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Command needs an argument.
    #[error("/{command} needs an argument")]
    MissingArgument {
        /// Command name without the slash
        command: &'static str,
    },

    /// Unknown slash command.
    #[error("unknown command /{0}, try /help")]
    Unknown(String),
}

/// One line per command, shown by `/help`.
pub const HELP: &[&str] = &[
    "/select <peer>   open a conversation (id or name)",
    "/who             list peers",
    "/file <path>     send a file to the open conversation",
    "/logout          end the session",
    "/quit            leave",
    "anything else    send to the open conversation",
];

/// Parse one input line.
pub fn parse(line: &str) -> Result<Input, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Nothing);
    }

    // "//text" sends a message starting with a slash.
    if let Some(text) = line.strip_prefix("//") {
        return Ok(Input::Say(format!("/{text}")));
    }

    let Some(command) = line.strip_prefix('/') else {
        return Ok(Input::Say(line.to_string()));
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "select" | "s" => {
            if arg.is_empty() {
                Err(InputError::MissingArgument { command: "select" })
            } else {
                Ok(Input::Select(arg.to_string()))
            }
        },
        "file" | "f" => {
            if arg.is_empty() {
                Err(InputError::MissingArgument { command: "file" })
            } else {
                Ok(Input::File(PathBuf::from(arg)))
            }
        },
        "who" | "w" => Ok(Input::Who),
        "logout" => Ok(Input::Logout),
        "quit" | "q" => Ok(Input::Quit),
        "help" | "h" => Ok(Input::Help),
        other => Err(InputError::Unknown(other.to_string())),
    }
}
