//! Terminal assistant runtime facade.
//!
//! Bundles the workspace crates behind feature flags: validated tools and
//! their registry, model adapters, prompts, the two-phase kernel, settings,
//! and tracing setup.

#![warn(missing_docs, clippy::pedantic)]

/// Shared identifiers.
pub use assist_primitives as primitives;

/// Two-phase orchestrator (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use assist_kernel as kernel;

/// Model adapters (enabled by `adapters` feature).
#[cfg(feature = "adapters")]
pub use assist_adapters as adapters;

/// Tool declaration, validation, and registry (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use assist_tools as tools;

/// Tracing setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use assist_telemetry as telemetry;

/// Phase prompts and templates (enabled by `prompts` feature).
#[cfg(feature = "prompts")]
pub use assist_prompts as prompts;

/// Layered settings (enabled by `config` feature).
#[cfg(feature = "config")]
pub use assist_config as config;
