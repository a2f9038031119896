//! Line editing and persistent input history for the REPL.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use tracing::warn;

const HISTORY_FILE: &str = "history.txt";

/// What the user did at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    /// A submitted line.
    Line(String),
    /// Ctrl-C: drop the current line and prompt again.
    Cancelled,
    /// Ctrl-D or end of input.
    Eof,
}

/// Readline editor whose history lives next to saved sessions.
pub struct LineEditor {
    editor: Editor<(), DefaultHistory>,
    history_path: PathBuf,
}

impl LineEditor {
    /// Creates the editor and loads earlier history from `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut editor: Editor<(), DefaultHistory> =
            Editor::new().context("failed to create line editor")?;
        let history_path = history_path(dir);
        if let Err(err) = editor.load_history(&history_path) {
            let not_found = matches!(
                &err,
                ReadlineError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound
            );
            if !not_found {
                warn!(path = %history_path.display(), "failed to load history: {err}");
            }
        }
        Ok(Self {
            editor,
            history_path,
        })
    }

    /// Reads one line; the blocking read runs off the async workers.
    pub fn read(&mut self, prompt: &str) -> Result<Input> {
        let result = tokio::task::block_in_place(|| self.editor.readline(prompt));
        let input = classify(result)?;
        if let Input::Line(line) = &input {
            if !line.trim().is_empty() {
                if let Err(err) = self.editor.add_history_entry(line.as_str()) {
                    warn!("failed to add history entry: {err}");
                }
            }
        }
        Ok(input)
    }

    /// Writes history to disk, creating the directory when needed.
    pub fn save_history(&mut self) {
        if let Some(parent) = self.history_path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!("failed to create history directory: {err}");
                return;
            }
        }
        if let Err(err) = self.editor.save_history(&self.history_path) {
            warn!("failed to save history: {err}");
        }
    }
}

fn history_path(dir: &Path) -> PathBuf {
    dir.join(HISTORY_FILE)
}

fn classify(result: Result<String, ReadlineError>) -> Result<Input> {
    match result {
        Ok(line) => Ok(Input::Line(line)),
        Err(ReadlineError::Interrupted) => Ok(Input::Cancelled),
        Err(ReadlineError::Eof) => Ok(Input::Eof),
        Err(err) => Err(err).context("failed to read input"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_c_cancels_and_ctrl_d_ends() {
        assert_eq!(
            classify(Ok("hello".into())).unwrap(),
            Input::Line("hello".into())
        );
        assert_eq!(
            classify(Err(ReadlineError::Interrupted)).unwrap(),
            Input::Cancelled
        );
        assert_eq!(classify(Err(ReadlineError::Eof)).unwrap(), Input::Eof);
    }

    #[test]
    fn other_read_errors_propagate() {
        let io = std::io::Error::other("tty gone");
        assert!(classify(Err(ReadlineError::Io(io))).is_err());
    }

    #[test]
    fn history_lives_beside_sessions() {
        assert_eq!(
            history_path(Path::new("sessions")),
            PathBuf::from("sessions/history.txt")
        );
    }
}
