//! Builder-based tool declaration.
//!
//! ```
//! use assist_tools::{ParameterRule, ToolBuilder, ToolRegistry};
//! use serde_json::{Value, json};
//!
//! let mut registry = ToolRegistry::new();
//! ToolBuilder::new("greet")
//!     .description("Greets someone by name")
//!     .param("name", ParameterRule::string().regex("[A-Z][a-z]+"))
//!     .category("social")
//!     .register(&mut registry, |args: Value| async move {
//!         Ok(json!(format!("Hello, {}!", args["name"].as_str().unwrap_or_default())))
//!     })
//!     .unwrap();
//! assert!(registry.get_tool("greet").is_ok());
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use assist_primitives::Category;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PluginError, ToolResult};
use crate::registry::ToolRegistry;
use crate::spec::{Capabilities, DEFAULT_TOOL_VERSION, ToolSpec};
use crate::validation::{ParameterRule, ParameterSpec, validate_arguments};

const MAX_TOOL_NAME_LEN: usize = 64;

/// Async body of a tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool with already-validated arguments.
    async fn call(&self, args: Value) -> ToolResult<Value>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Send + Sync + Fn(Value) -> Fut,
    Fut: Future<Output = ToolResult<Value>> + Send + 'static,
{
    async fn call(&self, args: Value) -> ToolResult<Value> {
        (self)(args).await
    }
}

/// Collects a tool's declaration and pairs it with a handler.
#[derive(Debug)]
pub struct ToolBuilder {
    name: String,
    description: String,
    params: Vec<(String, ParameterRule)>,
    categories: Vec<String>,
    requires_network: bool,
    requires_filesystem: bool,
    rate_limited: bool,
    version: Option<String>,
    author: Option<String>,
    example_usage: Option<String>,
}

impl ToolBuilder {
    /// Starts a declaration for the named tool.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            params: Vec::new(),
            categories: Vec::new(),
            requires_network: false,
            requires_filesystem: false,
            rate_limited: false,
            version: None,
            author: None,
            example_usage: None,
        }
    }

    /// Sets the description shown to the model.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declares a parameter. Order of calls is validation order.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, rule: ParameterRule) -> Self {
        self.params.push((name.into(), rule));
        self
    }

    /// Adds a category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    /// Adds several categories.
    #[must_use]
    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories
            .extend(categories.into_iter().map(Into::into));
        self
    }

    /// Flags the tool as using the network.
    #[must_use]
    pub fn requires_network(mut self) -> Self {
        self.requires_network = true;
        self
    }

    /// Flags the tool as using the filesystem.
    #[must_use]
    pub fn requires_filesystem(mut self) -> Self {
        self.requires_filesystem = true;
        self
    }

    /// Flags the tool as rate limited.
    #[must_use]
    pub fn rate_limited(mut self) -> Self {
        self.rate_limited = true;
        self
    }

    /// Sets the version string.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Sets an example invocation.
    #[must_use]
    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example_usage = Some(example.into());
        self
    }

    /// Resolves the declaration into an immutable [`ToolSpec`].
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::InvalidSpec`] for a malformed tool name,
    /// duplicate parameters, invalid categories, or inconsistent rules.
    pub fn build_spec(self) -> ToolResult<ToolSpec> {
        validate_tool_name(&self.name)?;

        let mut parameters = Vec::with_capacity(self.params.len());
        for (name, rule) in self.params {
            if parameters
                .iter()
                .any(|existing: &ParameterSpec| existing.name() == name)
            {
                return Err(PluginError::invalid_spec(format!(
                    "tool `{}` declares parameter `{name}` twice",
                    self.name
                )));
            }
            parameters.push(rule.resolve(name)?);
        }

        let categories = self
            .categories
            .into_iter()
            .map(Category::new)
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(|err| PluginError::invalid_spec(err.to_string()))?;

        let capabilities = Capabilities::new(
            categories,
            self.requires_network,
            self.requires_filesystem,
            self.rate_limited,
            self.version
                .unwrap_or_else(|| DEFAULT_TOOL_VERSION.to_owned()),
            self.author,
            self.example_usage,
        );

        Ok(ToolSpec::new(
            self.name,
            self.description,
            parameters,
            capabilities,
        ))
    }

    /// Finishes the declaration with its handler.
    ///
    /// # Errors
    ///
    /// See [`ToolBuilder::build_spec`].
    pub fn handler<H>(self, handler: H) -> ToolResult<RegisteredTool>
    where
        H: ToolHandler + 'static,
    {
        let spec = self.build_spec()?;
        Ok(RegisteredTool {
            spec: Arc::new(spec),
            handler: Arc::new(handler),
        })
    }

    /// Finishes the declaration and registers it in one step.
    ///
    /// # Errors
    ///
    /// See [`ToolBuilder::build_spec`].
    pub fn register<H>(self, registry: &mut ToolRegistry, handler: H) -> ToolResult<()>
    where
        H: ToolHandler + 'static,
    {
        registry.register(self.handler(handler)?);
        Ok(())
    }
}

fn validate_tool_name(name: &str) -> ToolResult<()> {
    if name.is_empty() || name.len() > MAX_TOOL_NAME_LEN {
        return Err(PluginError::invalid_spec(format!(
            "tool name must be 1..={MAX_TOOL_NAME_LEN} characters, got {name:?}"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(PluginError::invalid_spec(format!(
            "tool name {name:?} may only contain ASCII letters, digits, `_` and `-`"
        )));
    }
    Ok(())
}

/// A declared tool paired with its handler, ready for invocation.
#[derive(Clone)]
pub struct RegisteredTool {
    spec: Arc<ToolSpec>,
    handler: Arc<dyn ToolHandler>,
}

impl RegisteredTool {
    /// Returns the declaration.
    #[must_use]
    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Returns the tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// Validates arguments without running the handler.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Validation`] for the first failed rule.
    pub fn validate(&self, args: &Value) -> ToolResult<()> {
        validate_arguments(self.spec.name(), self.spec.parameters(), args)
    }

    /// Validates, fills defaults for absent optional parameters, then runs
    /// the handler and returns its result unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Validation`] before the handler runs, or
    /// whatever the handler returns.
    pub async fn invoke(&self, args: Value) -> ToolResult<Value> {
        self.validate(&args)?;
        let args = self.with_defaults(args);
        debug!(tool = self.name(), %args, "invoking tool");
        self.handler.call(args).await
    }

    fn with_defaults(&self, args: Value) -> Value {
        let mut map = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for param in self.spec.parameters() {
            if let Some(default) = param.default_value() {
                let absent = map.get(param.name()).is_none_or(Value::is_null);
                if absent {
                    map.insert(param.name().to_owned(), default.clone());
                }
            }
        }
        Value::Object(map)
    }
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}
