//! Errors surfaced by a conversation turn.

use std::path::PathBuf;

use assist_adapters::traits::AdapterError;
use assist_prompts::{Phase, PromptError};
use thiserror::Error;

/// Result alias for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Failures that end a turn or a session operation.
///
/// Tool failures are not represented here; they are fed back to the model.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The user message was rejected before any model call.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Why the input was rejected.
        reason: String,
    },

    /// The model answered with nothing.
    #[error("model returned an empty {phase} response")]
    EmptyResponse {
        /// Phase that produced the empty reply.
        phase: Phase,
    },

    /// The model backend failed.
    #[error("{phase} request failed: {source}")]
    Adapter {
        /// Phase in which the request failed.
        phase: Phase,
        /// Adapter error.
        #[source]
        source: AdapterError,
    },

    /// The model kept requesting tools past the configured limit.
    #[error("model requested tools for {rounds} rounds without a final answer")]
    ToolLoopExhausted {
        /// Rounds executed before giving up.
        rounds: usize,
    },

    /// A prompt could not be rendered.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// A conversation could not be saved or loaded.
    #[error("session file {path}: {reason}")]
    Session {
        /// File involved.
        path: PathBuf,
        /// Failure description.
        reason: String,
    },
}

impl KernelError {
    /// Shortcut for [`KernelError::InvalidInput`].
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn session(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Session {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
