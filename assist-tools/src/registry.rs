//! Registry of declared tools, indexed by name and by category.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use assist_primitives::Category;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::declare::RegisteredTool;
use crate::error::{PluginError, ToolResult};
use crate::spec::{Capabilities, ToolSpec};

/// A plugin that failed to register during discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PluginFailure {
    /// Plugin name.
    pub plugin: String,
    /// Rendered error.
    pub error: String,
}

/// Snapshot of the registry for status displays.
#[derive(Clone, Debug, Serialize)]
pub struct RegistryStatus {
    /// Number of registered tools.
    pub total_tools: usize,
    /// Number of distinct categories.
    pub total_categories: usize,
    /// Tool names per category, both sorted.
    pub tools_by_category: BTreeMap<String, Vec<String>>,
    /// Sorted names of rate-limited tools.
    pub rate_limited_tools: Vec<String>,
    /// Plugins that failed to load.
    pub plugin_errors: Vec<PluginFailure>,
}

/// Registry that stores tools keyed by name.
///
/// Populated through `&mut self` during startup, then shared behind an `Arc`
/// for read-only use.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    categories: BTreeMap<Category, BTreeSet<String>>,
    plugin_errors: Vec<PluginFailure>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry")
            .field("registered", &names)
            .field("plugin_errors", &self.plugin_errors.len())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool of the same name.
    ///
    /// Returns the replaced tool, if there was one. Its category entries are
    /// dropped before the new tool's are added.
    pub fn register(&mut self, tool: RegisteredTool) -> Option<RegisteredTool> {
        let name = tool.name().to_owned();
        let categories = tool.spec().capabilities().categories().clone();

        let previous = self.tools.insert(name.clone(), tool);
        if let Some(previous) = &previous {
            warn!(tool = %name, "overwriting previously registered tool");
            self.unindex(&name, previous.spec().capabilities().categories());
        }

        for category in categories {
            self.categories
                .entry(category)
                .or_default()
                .insert(name.clone());
        }
        debug!(tool = %name, "registered tool");

        previous
    }

    fn unindex(&mut self, name: &str, categories: &BTreeSet<Category>) {
        for category in categories {
            if let Some(names) = self.categories.get_mut(category) {
                names.remove(name);
                if names.is_empty() {
                    self.categories.remove(category);
                }
            }
        }
    }

    /// Looks up a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::ToolNotFound`] when no such tool exists.
    pub fn get_tool(&self, name: &str) -> ToolResult<&RegisteredTool> {
        self.tools
            .get(name)
            .ok_or_else(|| PluginError::ToolNotFound {
                name: name.to_owned(),
            })
    }

    /// Returns the names of tools in a category; empty if the category is unknown.
    #[must_use]
    pub fn get_tools_by_category(&self, category: &str) -> BTreeSet<String> {
        self.categories.get(category).cloned().unwrap_or_default()
    }

    /// Returns a tool's capability metadata.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::ToolNotFound`] when no such tool exists.
    pub fn get_capabilities(&self, name: &str) -> ToolResult<&Capabilities> {
        self.get_tool(name)
            .map(|tool| tool.spec().capabilities())
    }

    /// Returns whether a tool of this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` when no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Known categories in sorted order.
    #[must_use]
    pub fn categories(&self) -> Vec<&Category> {
        self.categories.keys().collect()
    }

    /// Every tool's declaration, sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<&ToolSpec> {
        let mut specs: Vec<_> = self.tools.values().map(RegisteredTool::spec).collect();
        specs.sort_by(|a, b| a.name().cmp(b.name()));
        specs
    }

    /// Function declarations for every tool, sorted by name.
    #[must_use]
    pub fn function_schemas(&self) -> Vec<Value> {
        self.list()
            .into_iter()
            .map(ToolSpec::function_schema)
            .collect()
    }

    /// Sorted names of tools flagged as rate limited.
    #[must_use]
    pub fn rate_limited_tools(&self) -> Vec<&str> {
        self.list()
            .into_iter()
            .filter(|spec| spec.capabilities().rate_limited())
            .map(ToolSpec::name)
            .collect()
    }

    /// Validates arguments and runs the named tool.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::ToolNotFound`], a validation error, or the
    /// handler's own error.
    pub async fn invoke(&self, name: &str, args: Value) -> ToolResult<Value> {
        self.get_tool(name)?.invoke(args).await
    }

    /// Moves every tool out of `other` into this registry.
    pub fn absorb(&mut self, other: Self) {
        for (_, tool) in other.tools {
            self.register(tool);
        }
    }

    /// Records a plugin that failed to register.
    pub fn record_plugin_error(&mut self, plugin: impl Into<String>, error: impl fmt::Display) {
        let failure = PluginFailure {
            plugin: plugin.into(),
            error: error.to_string(),
        };
        warn!(plugin = %failure.plugin, error = %failure.error, "plugin failed to load");
        self.plugin_errors.push(failure);
    }

    /// Plugins that failed to register, in discovery order.
    #[must_use]
    pub fn plugin_errors(&self) -> &[PluginFailure] {
        &self.plugin_errors
    }

    /// Summarises the registry contents.
    #[must_use]
    pub fn status(&self) -> RegistryStatus {
        RegistryStatus {
            total_tools: self.tools.len(),
            total_categories: self.categories.len(),
            tools_by_category: self
                .categories
                .iter()
                .map(|(category, names)| {
                    (category.to_string(), names.iter().cloned().collect())
                })
                .collect(),
            rate_limited_tools: self
                .rate_limited_tools()
                .into_iter()
                .map(str::to_owned)
                .collect(),
            plugin_errors: self.plugin_errors.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::declare::ToolBuilder;
    use crate::error::ErrorKind;
    use crate::validation::{ParameterRule, Predicate};

    fn echo(name: &str, categories: &[&str]) -> RegisteredTool {
        ToolBuilder::new(name)
            .categories(categories.iter().copied())
            .handler(|args: Value| async move { Ok(args) })
            .unwrap()
    }

    #[tokio::test]
    async fn register_and_invoke_tool() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(echo("echo", &[])).is_none());

        let payload = json!({ "message": "hello" });
        let output = registry.invoke("echo", payload.clone()).await.unwrap();
        assert_eq!(output, payload);
        assert_eq!(
            registry.get_tools_by_category("general"),
            BTreeSet::from(["echo".to_owned()])
        );
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let registry = ToolRegistry::new();
        let err = registry
            .invoke("missing", Value::Null)
            .await
            .expect_err("unknown tool should error");
        assert!(matches!(err, PluginError::ToolNotFound { name } if name == "missing"));
        assert_eq!(
            registry.get_capabilities("missing").unwrap_err().kind(),
            ErrorKind::ToolNotFound
        );
    }

    #[test]
    fn category_query_returns_every_member() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("read", &["io"]));
        registry.register(echo("write", &["io", "mutating"]));

        let io = registry.get_tools_by_category("io");
        assert_eq!(io.len(), 2);
        assert!(io.contains("read") && io.contains("write"));
        assert!(registry.get_tools_by_category("unknown").is_empty());
    }

    #[test]
    fn overwrite_keeps_category_index_consistent() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("tool", &["old"]));
        let previous = registry.register(echo("tool", &["new"]));

        assert!(previous.is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.get_tools_by_category("old").is_empty());
        assert!(registry.get_tools_by_category("new").contains("tool"));
        assert_eq!(registry.categories().len(), 1);
    }

    #[tokio::test]
    async fn age_range_is_enforced_before_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let mut registry = ToolRegistry::new();
        ToolBuilder::new("register_user")
            .param("age", ParameterRule::integer().range(0, 150))
            .register(&mut registry, move |args: Value| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Ok(args["age"].clone())
                }
            })
            .unwrap();

        let err = registry
            .invoke("register_user", json!({ "age": 200 }))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeViolation);
        assert!(err.to_string().contains("max"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let age = registry
            .invoke("register_user", json!({ "age": 30 }))
            .await
            .unwrap();
        assert_eq!(age, json!(30));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn every_rule_kind_surfaces_through_invoke() {
        fn is_even(value: &Value) -> bool {
            value.as_i64().is_some_and(|n| n % 2 == 0)
        }

        let mut registry = ToolRegistry::new();
        ToolBuilder::new("contact")
            .param(
                "email",
                ParameterRule::string().regex(r"[\w.]+@[\w.]+\.\w+"),
            )
            .param(
                "role",
                ParameterRule::string()
                    .allowed_values(["admin", "guest"])
                    .default("guest"),
            )
            .param(
                "seats",
                ParameterRule::integer()
                    .custom(Predicate::new("even", is_even, "Seats must be even"))
                    .default(2),
            )
            .register(&mut registry, |args: Value| async move { Ok(args) })
            .unwrap();

        let cases = [
            (json!({}), ErrorKind::MissingParameter),
            (json!({ "email": 5 }), ErrorKind::TypeMismatch),
            (json!({ "email": "nope" }), ErrorKind::PatternMismatch),
            (
                json!({ "email": "a@b.io", "role": "root" }),
                ErrorKind::InvalidChoice,
            ),
            (
                json!({ "email": "a@b.io", "seats": 3 }),
                ErrorKind::CustomValidationFailure,
            ),
        ];
        for (args, kind) in cases {
            let err = registry.invoke("contact", args).await.unwrap_err();
            assert_eq!(err.kind(), kind, "{err}");
        }

        let ok = registry
            .invoke("contact", json!({ "email": "a@b.io" }))
            .await
            .unwrap();
        assert_eq!(ok["role"], "guest");
        assert_eq!(ok["seats"], 2);
    }

    #[test]
    fn status_summarises_contents() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("a", &["x"]));
        registry.register(
            ToolBuilder::new("b")
                .category("x")
                .rate_limited()
                .handler(|args: Value| async move { Ok(args) })
                .unwrap(),
        );
        registry.record_plugin_error("broken", PluginError::invalid_spec("bad"));

        let status = registry.status();
        assert_eq!(status.total_tools, 2);
        assert_eq!(status.total_categories, 1);
        assert_eq!(status.tools_by_category["x"], vec!["a", "b"]);
        assert_eq!(status.rate_limited_tools, vec!["b"]);
        assert_eq!(status.plugin_errors[0].plugin, "broken");
        assert_eq!(registry.function_schemas().len(), 2);
    }
}
