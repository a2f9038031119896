//! Prompt templates with `{{variable}}` substitution.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur during template operations.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// A required variable was not provided.
    #[error("missing required variable: {name}")]
    MissingVariable {
        /// Name of the missing variable.
        name: String,
    },

    /// A placeholder was opened but never closed.
    #[error("unterminated placeholder at byte {offset}")]
    Unterminated {
        /// Byte offset of the opening braces.
        offset: usize,
    },
}

/// A prompt template with variable substitution.
///
/// Placeholders use `{{name}}`; surrounding whitespace inside the braces is
/// ignored. Unknown optional variables render as the empty string. Text in
/// double braces that is not an identifier is kept verbatim so JSON examples
/// survive rendering.
///
/// # Examples
///
/// ```
/// use assist_prompts::template::PromptTemplate;
///
/// let template = PromptTemplate::builder("You are {{name}}. {{task}}")
///     .with_variable("name", "Gemini")
///     .with_variable("task", "Answer concisely.")
///     .build()
///     .unwrap();
///
/// assert_eq!(template.render().unwrap(), "You are Gemini. Answer concisely.");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    template: String,
    variables: HashMap<String, String>,
    required_variables: BTreeSet<String>,
}

impl PromptTemplate {
    /// Creates a template without defaults or required variables.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            variables: HashMap::new(),
            required_variables: BTreeSet::new(),
        }
    }

    /// Returns a builder for constructing templates.
    #[must_use]
    pub fn builder(template: impl Into<String>) -> TemplateBuilder {
        TemplateBuilder::new(template)
    }

    /// Sets a default variable value.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Returns the default value of a variable if set.
    #[must_use]
    pub fn get_variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Renders the template with its default variables.
    ///
    /// # Errors
    ///
    /// See [`PromptTemplate::render_with`].
    pub fn render(&self) -> TemplateResult<String> {
        self.render_with(&HashMap::new())
    }

    /// Renders the template; `runtime_vars` override the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingVariable`] if a required variable has
    /// no value and [`TemplateError::Unterminated`] for a dangling `{{`.
    pub fn render_with(&self, runtime_vars: &HashMap<String, String>) -> TemplateResult<String> {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        let mut consumed = 0;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or(TemplateError::Unterminated {
                offset: consumed + start,
            })?;
            let raw = &after[..end];
            let name = raw.trim();

            if is_identifier(name) {
                match runtime_vars.get(name).or_else(|| self.variables.get(name)) {
                    Some(value) => out.push_str(value),
                    None if self.required_variables.contains(name) => {
                        return Err(TemplateError::MissingVariable {
                            name: name.to_owned(),
                        });
                    }
                    None => {}
                }
            } else {
                out.push_str("{{");
                out.push_str(raw);
                out.push_str("}}");
            }

            let advance = start + 2 + end + 2;
            consumed += advance;
            rest = &rest[advance..];
        }

        out.push_str(rest);
        Ok(out)
    }

    /// Names of the variables referenced by the template, in order of first use.
    #[must_use]
    pub fn variable_refs(&self) -> Vec<String> {
        extract_variable_refs(&self.template)
    }

    /// Returns the raw template string.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// Builder for constructing prompt templates.
#[derive(Debug)]
pub struct TemplateBuilder {
    inner: PromptTemplate,
}

impl TemplateBuilder {
    /// Creates a new builder with the supplied template text.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            inner: PromptTemplate::new(template),
        }
    }

    /// Sets a variable with a default value.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.set_variable(name, value);
        self
    }

    /// Declares a variable that must have a value at render time.
    #[must_use]
    pub fn with_required_variable(mut self, name: impl Into<String>) -> Self {
        self.inner.required_variables.insert(name.into());
        self
    }

    /// Builds the template.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Unterminated`] if a placeholder is never closed.
    pub fn build(self) -> TemplateResult<PromptTemplate> {
        check_balanced(&self.inner.template)?;
        Ok(self.inner)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn check_balanced(template: &str) -> TemplateResult<()> {
    let mut offset = 0;
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or(TemplateError::Unterminated {
            offset: offset + start,
        })?;
        let advance = start + 2 + end + 2;
        offset += advance;
        rest = &rest[advance..];
    }
    Ok(())
}

fn extract_variable_refs(template: &str) -> Vec<String> {
    let mut vars: Vec<String> = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        let name = after[..end].trim();
        if is_identifier(name) && !vars.iter().any(|v| v == name) {
            vars.push(name.to_owned());
        }
        rest = &after[end + 2..];
    }
    vars
}
