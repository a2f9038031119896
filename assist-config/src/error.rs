//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating [`crate::Settings`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file was not valid JSON.
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// An environment variable held a value of the wrong shape.
    #[error("environment variable {key}={value:?} is invalid: {reason}")]
    InvalidVar {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
        /// Parse failure description.
        reason: String,
    },

    /// A setting is outside its permitted range.
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        /// Setting name.
        field: &'static str,
        /// Constraint that was violated.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
