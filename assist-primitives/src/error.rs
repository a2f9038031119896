//! Shared error definitions for primitive types.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the primitives crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided session identifier could not be parsed.
    #[error("invalid session id: {source}")]
    InvalidSessionId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Category name failed validation.
    #[error("invalid category `{name}`: {reason}")]
    InvalidCategory {
        /// The offending category string.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
