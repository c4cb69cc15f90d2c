//! Per-run tool loading.
//!
//! A [`ToolCatalog`] knows how to build every tool the engine could expose.
//! [`ToolCatalog::load`] turns it into the concrete [`ToolRegistry`] for one
//! run, honoring the mode's `enabled_tools` list from the current settings.

use std::collections::BTreeMap;
use std::sync::Arc;

use scribe_core::mode::Mode;
use scribe_core::tools::{ToolBox, ToolRegistry};
use scribe_toolkit::{builtin_tool, Workspace, BUILTIN_TOOL_NAMES};

use crate::config::Settings;

/// Builds one tool instance. Factories may fail, e.g. when a tool module
/// depends on configuration that is missing.
pub type ToolFactory = Arc<dyn Fn() -> anyhow::Result<ToolBox> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ToolCatalog {
    factories: BTreeMap<String, ToolFactory>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of the built-in workspace tools.
    pub fn builtin(workspace: Workspace) -> Self {
        let mut catalog = Self::new();
        for name in BUILTIN_TOOL_NAMES {
            let workspace = workspace.clone();
            catalog.register(name, move || {
                builtin_tool(name, &workspace)
                    .ok_or_else(|| anyhow::anyhow!("unknown built-in tool '{name}'"))
            });
        }
        catalog
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<ToolBox> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Registers an already-built tool under its schema name.
    pub fn register_tool(&mut self, tool: ToolBox) -> &mut Self {
        let name = tool.schema().name;
        self.register(name, move || Ok(tool.clone()))
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Instantiates the tools enabled for `mode`. Unknown names and failing
    /// factories are skipped with a warning; the load itself never fails.
    pub fn load(&self, mode: Mode, settings: &Settings) -> ToolRegistry {
        let wanted: Vec<String> = match settings.enabled_tools(mode) {
            Some(names) => names.to_vec(),
            None => self.names(),
        };

        let mut registry = ToolRegistry::new();
        for name in wanted {
            let Some(factory) = self.factories.get(&name) else {
                tracing::warn!(tool = %name, mode = %mode, "Enabled tool is not in the catalog; skipping");
                continue;
            };
            match factory() {
                Ok(tool) => {
                    let built = tool.schema().name;
                    if built != name {
                        tracing::warn!(tool = %name, built = %built, "Tool factory produced a differently named tool");
                    }
                    registry.register(tool);
                }
                Err(err) => {
                    tracing::warn!(tool = %name, mode = %mode, error = %err, "Failed to build tool; skipping");
                }
            }
        }

        tracing::debug!(mode = %mode, tools = ?registry.names(), "Loaded tool registry");
        registry
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("tools", &self.names())
            .finish()
    }
}
