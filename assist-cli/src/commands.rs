//! Slash commands understood by the REPL.

use std::path::{Path, PathBuf};

/// One line of REPL input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Leave the REPL.
    Exit,
    /// Forget the conversation.
    Clear,
    /// Save the conversation under a name.
    Save(String),
    /// Load a saved conversation.
    Load(String),
    /// List registered tools.
    Tools,
    /// Show registry and session status.
    Status,
    /// Print the last reasoning plan.
    Reasoning,
    /// Print command help.
    Help,
    /// Anything else starting with `/`.
    Unknown(String),
    /// A `/save` or `/load` without a usable name.
    BadName(&'static str),
    /// A message for the assistant.
    Message(String),
    /// Blank line.
    Empty,
}

pub const HELP: &str = "\
Commands:
  /exit              leave the assistant
  /clear             start a new conversation
  /save <name>       save the conversation
  /load <name>       load a saved conversation
  /tools             list available tools
  /status            show tools, categories and session info
  /reasoning         show the last reasoning plan
  /help              show this help
Anything else is sent to the assistant.";

impl Command {
    /// Parses one input line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Message(line.to_owned());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            "exit" | "quit" => Self::Exit,
            "clear" => Self::Clear,
            "save" => session_name(arg).map_or(Self::BadName("save"), Self::Save),
            "load" => session_name(arg).map_or(Self::BadName("load"), Self::Load),
            "tools" => Self::Tools,
            "status" => Self::Status,
            "reasoning" => Self::Reasoning,
            "help" | "?" => Self::Help,
            other => Self::Unknown(other.to_owned()),
        }
    }
}

/// Accepts names made of letters, digits, `-` and `_`.
fn session_name(arg: &str) -> Option<String> {
    let valid = !arg.is_empty()
        && arg.len() <= 64
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| arg.to_owned())
}

/// File holding the session saved as `name`.
pub fn session_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.json"))
}
