//! Errors raised while loading or rendering prompts.

use std::path::PathBuf;

use thiserror::Error;

use crate::template::TemplateError;

/// Result alias for prompt operations.
pub type PromptResult<T> = Result<T, PromptError>;

/// Errors produced by [`crate::PromptSet`].
#[derive(Debug, Error)]
pub enum PromptError {
    /// The prompts file could not be read.
    #[error("failed to read prompts from {path}: {source}")]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The prompts file was not valid JSON or lacked a key.
    #[error("failed to parse prompts in {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A template could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),
}
