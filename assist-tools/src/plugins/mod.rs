//! Plugins group related tools and register them together at startup.

pub mod archive;
pub mod filesystem;
pub mod network;
pub mod system;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{PluginError, ToolResult};
use crate::registry::ToolRegistry;

pub use archive::ArchivePlugin;
pub use filesystem::FilesystemPlugin;
pub use network::NetworkPlugin;
pub use system::SystemPlugin;

/// A named group of tools.
pub trait Plugin: Send + Sync {
    /// Name used in discovery reports.
    fn name(&self) -> &str;

    /// Registers this plugin's tools.
    ///
    /// # Errors
    ///
    /// Returns the first declaration error encountered.
    fn register(&self, registry: &mut ToolRegistry) -> ToolResult<()>;
}

/// Outcome of a discovery pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryStats {
    /// Plugins whose tools were all registered.
    pub loaded_plugins: usize,
    /// Plugins that failed and contributed no tools.
    pub errored_plugins: usize,
    /// Tools in the registry after discovery.
    pub total_tools: usize,
    /// Categories in the registry after discovery.
    pub total_categories: usize,
}

/// Registers each plugin in order.
///
/// A plugin either contributes all of its tools or none: each one registers
/// into a scratch registry that is merged only on success. Failures are
/// recorded on `registry` and do not stop discovery.
pub fn discover(registry: &mut ToolRegistry, plugins: &[Box<dyn Plugin>]) -> DiscoveryStats {
    let mut stats = DiscoveryStats::default();

    for plugin in plugins {
        let mut scratch = ToolRegistry::new();
        match plugin.register(&mut scratch) {
            Ok(()) => {
                debug!(plugin = plugin.name(), tools = scratch.len(), "loaded plugin");
                registry.absorb(scratch);
                stats.loaded_plugins += 1;
            }
            Err(err) => {
                registry.record_plugin_error(plugin.name(), &err);
                stats.errored_plugins += 1;
            }
        }
    }

    stats.total_tools = registry.len();
    stats.total_categories = registry.categories().len();
    info!(
        loaded = stats.loaded_plugins,
        errored = stats.errored_plugins,
        tools = stats.total_tools,
        "plugin discovery finished"
    );
    stats
}

/// Plugins shipped with the assistant.
#[must_use]
pub fn builtin_plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(FilesystemPlugin),
        Box::new(SystemPlugin),
        Box::new(NetworkPlugin),
        Box::new(ArchivePlugin),
    ]
}

pub(crate) fn str_arg<'a>(args: &'a Value, name: &str) -> ToolResult<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| PluginError::execution(format!("argument `{name}` must be a string")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declare::ToolBuilder;
    use crate::validation::ParameterRule;

    struct Broken;

    impl Plugin for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn register(&self, registry: &mut ToolRegistry) -> ToolResult<()> {
            ToolBuilder::new("half_done")
                .register(registry, |args: Value| async move { Ok(args) })?;
            ToolBuilder::new("bad")
                .param("n", ParameterRule::integer().range(5, 1))
                .register(registry, |args: Value| async move { Ok(args) })
        }
    }

    #[test]
    fn builtins_register_expected_tools() {
        let mut registry = ToolRegistry::new();
        let stats = discover(&mut registry, &builtin_plugins());

        assert_eq!(stats.loaded_plugins, 4);
        assert_eq!(stats.errored_plugins, 0);
        for name in [
            "list_dir",
            "read_file",
            "write_file",
            "get_file_metadata",
            "run_shell_command",
            "get_current_datetime",
            "get_environment_variable",
            "get_system_info",
            "get_website_text_content",
            "http_get_request",
            "http_post_request",
            "download_file_from_url",
            "zip_archive_files",
            "zip_extract_files",
        ] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert_eq!(stats.total_tools, registry.len());
        assert!(registry.get_tools_by_category("filesystem").contains("read_file"));
        assert!(registry.get_tools_by_category("system").contains("run_shell_command"));
        assert!(registry.get_tools_by_category("web").contains("http_get_request"));
        assert!(registry.get_tools_by_category("archive").contains("zip_extract_files"));
        assert!(registry.rate_limited_tools().contains(&"http_get_request"));
    }

    #[test]
    fn failing_plugin_is_recorded_and_contributes_nothing() {
        let mut registry = ToolRegistry::new();
        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(Broken), Box::new(SystemPlugin)];
        let stats = discover(&mut registry, &plugins);

        assert_eq!(stats.loaded_plugins, 1);
        assert_eq!(stats.errored_plugins, 1);
        assert!(!registry.contains("half_done"));
        assert_eq!(registry.plugin_errors()[0].plugin, "broken");
        assert!(registry.contains("get_system_info"));
    }
}
