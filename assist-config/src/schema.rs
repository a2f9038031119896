//! Strongly typed settings schema.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// OpenAI-compatible endpoint served by Gemini.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";

/// Which wire protocol the model backend speaks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// `POST {base}/chat/completions` in the `OpenAI` format.
    #[default]
    OpenAi,
    /// A local Ollama daemon.
    Ollama,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => f.write_str("openai"),
            Self::Ollama => f.write_str("ollama"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "gemini" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown provider `{other}` (expected openai or ollama)")),
        }
    }
}

/// Runtime settings of the assistant.
///
/// Unknown keys in a settings file are ignored; missing keys keep defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Model identifier sent to the backend.
    pub model: String,
    /// Backend protocol.
    pub provider: Provider,
    /// Endpoint override; `None` uses the provider default.
    pub base_url: Option<String>,
    /// Assistant display name.
    pub name: String,
    /// Sampling temperature in `0..=1`.
    pub temperature: f32,
    /// Nucleus sampling in `0..=1`.
    pub top_p: Option<f32>,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling seed.
    pub seed: Option<i64>,
    /// Verbose logging and reasoning display.
    pub debug: bool,
    /// Clear the terminal when the REPL starts.
    pub clear_terminal: bool,
    /// Most recent history messages sent with each request.
    pub history_limit: usize,
    /// Tool-call rounds allowed per turn.
    pub max_tool_rounds: usize,
    /// Score reasoning plans before execution.
    pub enable_reasoning_validation: bool,
    /// Plans scoring below this are flagged.
    pub reasoning_quality_threshold: f64,
    /// HTTP timeout for model requests.
    pub request_timeout_secs: u64,
    /// Optional JSON file overriding the built-in prompts.
    pub prompts_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_owned(),
            provider: Provider::OpenAi,
            base_url: None,
            name: "Gemini".to_owned(),
            temperature: 0.25,
            top_p: None,
            max_tokens: 8192,
            seed: None,
            debug: false,
            clear_terminal: true,
            history_limit: 40,
            max_tool_rounds: 8,
            enable_reasoning_validation: true,
            reasoning_quality_threshold: 0.7,
            request_timeout_secs: 60,
            prompts_path: None,
        }
    }
}

impl Settings {
    /// Checks every range constraint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::invalid("model", "must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::invalid("name", "must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::invalid(
                "temperature",
                format!("{} is outside 0..=1", self.temperature),
            ));
        }
        if let Some(top_p) = self.top_p.filter(|p| !(0.0..=1.0).contains(p)) {
            return Err(ConfigError::invalid(
                "top_p",
                format!("{top_p} is outside 0..=1"),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::invalid("max_tokens", "must be greater than 0"));
        }
        if self.max_tool_rounds == 0 {
            return Err(ConfigError::invalid(
                "max_tool_rounds",
                "must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.reasoning_quality_threshold) {
            return Err(ConfigError::invalid(
                "reasoning_quality_threshold",
                format!("{} is outside 0..=1", self.reasoning_quality_threshold),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "request_timeout_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// HTTP timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL to use for the configured provider, if one is needed.
    ///
    /// The `OpenAI` provider falls back to Gemini's compatibility endpoint
    /// when the model name looks like a Gemini model.
    #[must_use]
    pub fn effective_base_url(&self) -> Option<&str> {
        match (&self.base_url, self.provider) {
            (Some(url), _) => Some(url.as_str()),
            (None, Provider::OpenAi) if self.model.starts_with("gemini") => {
                Some(DEFAULT_GEMINI_BASE_URL)
            }
            (None, _) => None,
        }
    }
}
