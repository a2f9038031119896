//! Core shared types for the gem-assist runtime.

#![warn(missing_docs, clippy::pedantic)]

mod category;
mod error;
mod ids;

/// Tool category identifiers and the default category name.
pub use category::{Category, DEFAULT_CATEGORY};
/// Error type and result alias shared across the workspace.
pub use error::{Error, Result};
/// Identifiers for chat sessions and tool calls.
pub use ids::{SessionId, ToolCallId};
