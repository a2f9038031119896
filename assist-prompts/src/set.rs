//! The reasoning, execution and base prompts used by the two-phase loop.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::RuntimeContext;
use crate::error::{PromptError, PromptResult};
use crate::template::PromptTemplate;

const DEFAULT_REASONING_PROMPT: &str = "\
You are a reasoning engine focused on planning solutions to user queries.
Think through how to solve the query step by step WITHOUT executing any actions.

# AVAILABLE TOOLS
{{tools}}

# REQUIRED SECTIONS
Structure the plan with these headings:
## Problem Analysis
What is being asked and which constraints apply.
## Information Needs
Which facts must be gathered before answering.
## Tool Selection Strategy
Which tools to call, in which order, with which arguments.
## Verification Strategy
How the results will be checked before the final answer.

Reference tools as name(arguments). Do not call tools yet; only plan.";

const DEFAULT_EXECUTION_PROMPT: &str = "\
You are an execution engine responsible for carrying out a pre-defined plan.

# EXECUTION REQUIREMENTS
1. Follow the reasoning plan.
2. Use tools as specified in the plan and gather all information before synthesis.
3. Check tool results for errors; if a call fails, correct the arguments and retry.
4. Finish with a clear answer for the user.";

const DEFAULT_BASE_SYSTEM_PROMPT: &str = "\
You are {{name}}, a terminal-based AI assistant that can work with files,
run shell commands and inspect the local system.
Approach tasks methodically, communicate clearly and handle errors explicitly.";

const SYSTEM_CONTEXT_BLOCK: &str = "\
# SYSTEM CONTEXT
- Assistant: {{name}}
- Date and time: {{datetime}}
- Operating system: {{os}}
- Working directory: {{cwd}}";

/// Which half of a turn a prompt is rendered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Planning call, no tools offered.
    Reasoning,
    /// Tool-using call that follows the plan.
    Execution,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reasoning => f.write_str("reasoning"),
            Self::Execution => f.write_str("execution"),
        }
    }
}

/// System prompts for both phases plus the shared base prompt.
///
/// Fields missing from a loaded file keep their built-in defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSet {
    /// Prompt for the planning call.
    pub reasoning_prompt: String,
    /// Prompt for the tool-using call.
    pub execution_prompt: String,
    /// Preamble shared by both phases.
    pub base_system_prompt: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            reasoning_prompt: DEFAULT_REASONING_PROMPT.to_owned(),
            execution_prompt: DEFAULT_EXECUTION_PROMPT.to_owned(),
            base_system_prompt: DEFAULT_BASE_SYSTEM_PROMPT.to_owned(),
        }
    }
}

impl PromptSet {
    /// Loads prompts from a JSON file with `reasoning_prompt`,
    /// `execution_prompt` and `base_system_prompt` keys.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Io`] if the file cannot be read and
    /// [`PromptError::Parse`] if it is not valid JSON.
    pub fn load(path: impl AsRef<Path>) -> PromptResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let set: Self = serde_json::from_str(&raw).map_err(|source| PromptError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded prompt set");
        Ok(set)
    }

    /// Writes the prompts as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Io`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> PromptResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| PromptError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| PromptError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Raw prompt text for a phase.
    #[must_use]
    pub fn phase_prompt(&self, phase: Phase) -> &str {
        match phase {
            Phase::Reasoning => &self.reasoning_prompt,
            Phase::Execution => &self.execution_prompt,
        }
    }

    /// Renders the system prompt for `phase`: base prompt, phase prompt and a
    /// system context block, with placeholders filled from `context`.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Template`] if a prompt contains an unterminated
    /// placeholder.
    pub fn render(&self, phase: Phase, context: &RuntimeContext) -> PromptResult<String> {
        let composed = format!(
            "{}\n\n{}\n\n{}",
            self.base_system_prompt.trim(),
            self.phase_prompt(phase).trim(),
            SYSTEM_CONTEXT_BLOCK
        );
        let rendered = PromptTemplate::builder(composed)
            .build()?
            .render_with(&context.variables())?;
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn context() -> RuntimeContext {
        RuntimeContext::new("Gemini", "2025-01-01 10:00:00", "linux", "/work")
            .with_tools(["read_file", "run_shell_command"])
    }

    #[test]
    fn reasoning_prompt_lists_sections_and_tools() {
        let rendered = PromptSet::default()
            .render(Phase::Reasoning, &context())
            .unwrap();
        for heading in [
            "Problem Analysis",
            "Information Needs",
            "Tool Selection Strategy",
            "Verification Strategy",
        ] {
            assert!(rendered.contains(heading), "missing {heading}");
        }
        assert!(rendered.contains("read_file, run_shell_command"));
        assert!(rendered.contains("# SYSTEM CONTEXT"));
        assert!(rendered.contains("Working directory: /work"));
        assert!(rendered.starts_with("You are Gemini"));
    }

    #[test]
    fn execution_prompt_differs_from_reasoning() {
        let set = PromptSet::default();
        let reasoning = set.render(Phase::Reasoning, &context()).unwrap();
        let execution = set.render(Phase::Execution, &context()).unwrap();
        assert_ne!(reasoning, execution);
        assert!(execution.contains("execution engine"));
    }

    #[test]
    fn load_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"reasoning_prompt": "Plan for {{{{name}}}}."}}"#).unwrap();

        let set = PromptSet::load(file.path()).unwrap();
        assert_eq!(set.reasoning_prompt, "Plan for {{name}}.");
        assert_eq!(set.execution_prompt, DEFAULT_EXECUTION_PROMPT);
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = PromptSet::load(file.path()).unwrap_err();
        assert!(matches!(err, PromptError::Parse { .. }));
    }

    #[test]
    fn save_then_load_preserves_custom_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        let set = PromptSet {
            base_system_prompt: "Custom base".to_owned(),
            ..PromptSet::default()
        };
        set.save(&path).unwrap();
        assert_eq!(PromptSet::load(&path).unwrap(), set);
    }

    #[test]
    fn phase_displays_lowercase() {
        assert_eq!(Phase::Reasoning.to_string(), "reasoning");
        assert_eq!(Phase::Execution.to_string(), "execution");
    }
}
