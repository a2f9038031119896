//! Prompt texts and rendering for the two conversation phases.
//!
//! A [`PromptSet`] holds the base, reasoning, and execution prompts. Each is a
//! [`template::PromptTemplate`] rendered against a [`RuntimeContext`]
//! captured at the start of a turn.

#![warn(missing_docs, clippy::pedantic)]

pub mod context;
pub mod error;
pub mod set;
pub mod template;

pub use context::RuntimeContext;
pub use error::{PromptError, PromptResult};
pub use set::{Phase, PromptSet};
pub use template::{PromptTemplate, TemplateBuilder, TemplateError, TemplateResult};
