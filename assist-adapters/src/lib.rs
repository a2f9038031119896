//! Model adapters used by the assistant.
//!
//! Each module exposes an implementation for a specific provider while sharing
//! a common trait-based interface defined in [`traits`].

#![warn(missing_docs, clippy::pedantic)]

pub mod ollama;
pub mod openai;
pub mod traits;

mod http_client;
