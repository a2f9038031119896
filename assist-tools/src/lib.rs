//! Tool declaration, validation, and discovery utilities.
//!
//! Tools are declared with [`declare::ToolBuilder`], which attaches parameter
//! rules and capability metadata to an async handler. Startup code registers
//! the resulting [`declare::RegisteredTool`] values into an explicit
//! [`registry::ToolRegistry`], either directly or through a
//! [`plugins::Plugin`]. Every invocation validates its arguments before the
//! handler runs.

#![warn(missing_docs, clippy::pedantic)]

pub mod declare;
pub mod error;
pub mod plugins;
pub mod registry;
pub mod spec;
pub mod validation;

pub use declare::{RegisteredTool, ToolBuilder, ToolHandler};
pub use error::{Bound, ErrorKind, PluginError, ToolResult, Violation};
pub use plugins::{DiscoveryStats, Plugin, builtin_plugins, discover};
pub use registry::{PluginFailure, RegistryStatus, ToolRegistry};
pub use spec::{Capabilities, ToolSpec};
pub use validation::{ParamType, ParameterRule, ParameterSpec, Predicate, validate_arguments};
