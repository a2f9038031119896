//! Immutable descriptions of registered tools.

use std::collections::BTreeSet;

use assist_primitives::Category;
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::validation::ParameterSpec;

/// Version assigned to tools that do not declare one.
pub const DEFAULT_TOOL_VERSION: &str = "1.0.0";

/// Declarative facts about a tool, used for discovery and status reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    categories: BTreeSet<Category>,
    requires_network: bool,
    requires_filesystem: bool,
    rate_limited: bool,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    example_usage: Option<String>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            categories: BTreeSet::from([Category::general()]),
            requires_network: false,
            requires_filesystem: false,
            rate_limited: false,
            version: DEFAULT_TOOL_VERSION.to_owned(),
            author: None,
            example_usage: None,
        }
    }
}

impl Capabilities {
    pub(crate) fn new(
        categories: BTreeSet<Category>,
        requires_network: bool,
        requires_filesystem: bool,
        rate_limited: bool,
        version: String,
        author: Option<String>,
        example_usage: Option<String>,
    ) -> Self {
        let categories = if categories.is_empty() {
            BTreeSet::from([Category::general()])
        } else {
            categories
        };
        Self {
            categories,
            requires_network,
            requires_filesystem,
            rate_limited,
            version,
            author,
            example_usage,
        }
    }

    /// Categories the tool belongs to; never empty.
    #[must_use]
    pub fn categories(&self) -> &BTreeSet<Category> {
        &self.categories
    }

    /// Whether the tool talks to the network.
    #[must_use]
    pub const fn requires_network(&self) -> bool {
        self.requires_network
    }

    /// Whether the tool touches the filesystem.
    #[must_use]
    pub const fn requires_filesystem(&self) -> bool {
        self.requires_filesystem
    }

    /// Whether calls to the tool are subject to a rate limit.
    #[must_use]
    pub const fn rate_limited(&self) -> bool {
        self.rate_limited
    }

    /// Declared version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Declared author.
    #[must_use]
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    /// Example invocation shown in tool listings.
    #[must_use]
    pub fn example_usage(&self) -> Option<&str> {
        self.example_usage.as_deref()
    }
}

/// Full declaration of a tool: identity, parameters, and capabilities.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    name: String,
    description: String,
    parameters: Vec<ParameterSpec>,
    capabilities: Capabilities,
}

impl ToolSpec {
    pub(crate) fn new(
        name: String,
        description: String,
        parameters: Vec<ParameterSpec>,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            name,
            description,
            parameters,
            capabilities,
        }
    }

    /// Unique tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description shown to the model.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Parameters in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    /// Looks up a declared parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|param| param.name() == name)
    }

    /// Capability metadata.
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// JSON-schema object describing the tool's parameters.
    #[must_use]
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|param| (param.name().to_owned(), param.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|param| param.is_required())
            .map(ParameterSpec::name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Function declaration in the shape chat-completion APIs expect.
    #[must_use]
    pub fn function_schema(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters_schema(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ParameterRule;

    #[test]
    fn empty_categories_fall_back_to_general() {
        let caps = Capabilities::new(
            BTreeSet::new(),
            false,
            false,
            false,
            DEFAULT_TOOL_VERSION.into(),
            None,
            None,
        );
        assert!(caps.categories().contains("general"));
        assert_eq!(caps, Capabilities::default());
    }

    #[test]
    fn schema_marks_parameters_without_defaults_as_required() {
        let spec = ToolSpec::new(
            "read_file".into(),
            "Read a file".into(),
            vec![
                ParameterRule::string().resolve("filepath").unwrap(),
                ParameterRule::new().default(4096).resolve("max_bytes").unwrap(),
            ],
            Capabilities::default(),
        );

        let schema = spec.function_schema();
        assert_eq!(schema["name"], "read_file");
        assert_eq!(schema["parameters"]["required"], json!(["filepath"]));
        assert_eq!(
            schema["parameters"]["properties"]["max_bytes"]["type"],
            "integer"
        );
    }
}
