//! Configuration management for the assistant.
//!
//! [`Settings`] starts from built-in defaults, is overlaid by an optional JSON
//! file and then by `ASSISTANT_*` environment variables, and is validated
//! before use.

#![warn(missing_docs, clippy::pedantic)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::ENV_PREFIX;
pub use schema::{DEFAULT_GEMINI_BASE_URL, Provider, Settings};
