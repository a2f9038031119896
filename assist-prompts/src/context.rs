//! Runtime facts substituted into system prompts.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Local;

/// Snapshot of the environment the assistant runs in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeContext {
    name: String,
    datetime: String,
    os: String,
    cwd: String,
    tools: Vec<String>,
}

impl RuntimeContext {
    /// Builds a context with explicit values.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        datetime: impl Into<String>,
        os: impl Into<String>,
        cwd: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            datetime: datetime.into(),
            os: os.into(),
            cwd: cwd.into(),
            tools: Vec::new(),
        }
    }

    /// Captures the current local time, operating system and working directory.
    #[must_use]
    pub fn capture(name: impl Into<String>) -> Self {
        let cwd = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .display()
            .to_string();
        Self::new(
            name,
            Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            format!("{} ({})", std::env::consts::OS, std::env::consts::ARCH),
            cwd,
        )
    }

    /// Attaches the names of the tools available to the model.
    #[must_use]
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Assistant display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tool names attached to this context.
    #[must_use]
    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    /// Template variables: `name`, `datetime`, `os`, `cwd` and `tools`.
    #[must_use]
    pub fn variables(&self) -> HashMap<String, String> {
        let tools = if self.tools.is_empty() {
            "(none)".to_owned()
        } else {
            self.tools.join(", ")
        };
        HashMap::from([
            ("name".to_owned(), self.name.clone()),
            ("datetime".to_owned(), self.datetime.clone()),
            ("os".to_owned(), self.os.clone()),
            ("cwd".to_owned(), self.cwd.clone()),
            ("tools".to_owned(), tools),
        ])
    }
}
