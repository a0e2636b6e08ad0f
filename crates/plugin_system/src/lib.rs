//! Plugin loading for the gatekeeper server
//!
//! Plugins are compiled into the binary and handed to the [`PluginManager`]
//! at startup. Loading runs in two phases: every plugin registers its handlers
//! into a scratch registry, and only the plugins that succeed are merged into
//! the shared builder. A failing plugin is logged and skipped; it never leaves
//! half its bindings behind.

use gate_event_system::{EventBus, EventBusBuilder, GatePlugin, PluginError};
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

// ============================================================================
// Plugin Manager
// ============================================================================

/// Metadata recorded for every successfully loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMetadata {
    pub name: String,
    pub description: String,
    pub version: String,
    /// Handlers the plugin bound during registration
    pub handler_count: usize,
}

/// Outcome of [`PluginManager::load_all`].
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub loaded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, PluginError)>,
}

/// Owns the startup registry and the list of loaded plugins.
pub struct PluginManager {
    builder: EventBusBuilder,
    /// Names allowed to load; `None` loads everything offered
    whitelist: Option<HashSet<String>>,
    loaded: Vec<PluginMetadata>,
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginManager")
            .field("whitelist", &self.whitelist)
            .field("loaded", &self.loaded)
            .finish()
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(EventBusBuilder::new())
    }
}

impl PluginManager {
    /// Creates a manager that merges plugin bindings into `builder`.
    ///
    /// Handlers already on `builder` (the server's own) stay ahead of every
    /// plugin handler in publish order.
    pub fn new(builder: EventBusBuilder) -> Self {
        Self {
            builder,
            whitelist: None,
            loaded: Vec::new(),
        }
    }

    /// Restricts loading to the named plugins. An empty list allows all.
    pub fn with_whitelist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: HashSet<String> = names.into_iter().map(Into::into).collect();
        self.whitelist = if set.is_empty() { None } else { Some(set) };
        self
    }

    /// Registers a single plugin.
    pub fn load_plugin(&mut self, plugin: &dyn GatePlugin) -> Result<(), PluginError> {
        let name = plugin.name().to_string();

        if self.loaded.iter().any(|meta| meta.name == name) {
            return Err(PluginError::InitializationFailed(format!(
                "Plugin {} is already loaded",
                name
            )));
        }

        let mut scratch = EventBusBuilder::new();
        plugin.register_handlers(&mut scratch).map_err(|e| {
            error!("❌ Plugin {} failed to register handlers: {}", name, e);
            e
        })?;

        let handler_count = scratch.handler_total();
        self.builder.merge(scratch);
        self.loaded.push(PluginMetadata {
            name: name.clone(),
            description: plugin.description().to_string(),
            version: plugin.version().to_string(),
            handler_count,
        });

        info!(
            "🔌 Plugin {} v{} loaded, registered {} handler(s)",
            name,
            plugin.version(),
            handler_count
        );
        Ok(())
    }

    /// Registers every plugin in order, skipping those outside the whitelist.
    pub fn load_all(&mut self, plugins: &[Box<dyn GatePlugin>]) -> LoadSummary {
        let mut summary = LoadSummary::default();
        info!("Loading {} compiled-in plugin(s)", plugins.len());

        for plugin in plugins {
            let name = plugin.name().to_string();
            if !self.is_allowed(&name) {
                debug!("Plugin {} is not whitelisted, skipping", name);
                summary.skipped.push(name);
                continue;
            }

            match self.load_plugin(plugin.as_ref()) {
                Ok(()) => summary.loaded.push(name),
                Err(e) => summary.failed.push((name, e)),
            }
        }

        if let Some(whitelist) = &self.whitelist {
            for wanted in whitelist {
                if !plugins.iter().any(|p| p.name() == wanted) {
                    warn!("⚠️ Whitelisted plugin {} is not compiled in", wanted);
                }
            }
        }

        info!(
            "Plugin loading complete: {} loaded, {} skipped, {} failed",
            summary.loaded.len(),
            summary.skipped.len(),
            summary.failed.len()
        );
        summary
    }

    fn is_allowed(&self, name: &str) -> bool {
        self.whitelist
            .as_ref()
            .map_or(true, |set| set.contains(name))
    }

    pub fn plugin_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.loaded.iter().map(|meta| meta.name.clone()).collect()
    }

    pub fn plugin_metadata(&self, name: &str) -> Option<&PluginMetadata> {
        self.loaded.iter().find(|meta| meta.name == name)
    }

    /// Freezes the registry into the bus shared by every connection.
    pub fn into_event_bus(self) -> EventBus {
        self.builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_event_system::{names, ChatMessageEvent, ClientConnectionRef, PlayerJoinEvent};

    struct Counting {
        name: &'static str,
        handlers: usize,
    }

    impl GatePlugin for Counting {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> &str {
            "0.1.0"
        }

        fn register_handlers(&self, events: &mut EventBusBuilder) -> Result<(), PluginError> {
            for _ in 0..self.handlers {
                events.on(names::CHAT_MESSAGE, |_: ChatMessageEvent, _: &ClientConnectionRef| Ok(()))?;
            }
            Ok(())
        }
    }

    struct Broken;

    impl GatePlugin for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn version(&self) -> &str {
            "0.0.1"
        }

        fn register_handlers(&self, events: &mut EventBusBuilder) -> Result<(), PluginError> {
            events.on(names::PLAYER_JOIN, |_: PlayerJoinEvent, _: &ClientConnectionRef| Ok(()))?;
            Err(PluginError::InitializationFailed("missing resource".to_string()))
        }
    }

    #[test]
    fn test_loads_every_plugin_without_whitelist() {
        let plugins: Vec<Box<dyn GatePlugin>> = vec![
            Box::new(Counting { name: "a", handlers: 2 }),
            Box::new(Counting { name: "b", handlers: 1 }),
        ];
        let mut manager = PluginManager::default();
        let summary = manager.load_all(&plugins);

        assert_eq!(summary.loaded, vec!["a", "b"]);
        assert_eq!(manager.plugin_count(), 2);
        assert_eq!(manager.plugin_metadata("a").map(|m| m.handler_count), Some(2));

        let bus = manager.into_event_bus();
        assert_eq!(bus.handler_count(names::CHAT_MESSAGE), 3);
    }

    #[test]
    fn test_failed_plugin_leaves_no_bindings() {
        let plugins: Vec<Box<dyn GatePlugin>> = vec![
            Box::new(Broken),
            Box::new(Counting { name: "ok", handlers: 1 }),
        ];
        let mut manager = PluginManager::default();
        let summary = manager.load_all(&plugins);

        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "broken");
        assert_eq!(manager.plugin_names(), vec!["ok"]);

        let bus = manager.into_event_bus();
        assert_eq!(bus.handler_count(names::PLAYER_JOIN), 0);
        assert_eq!(bus.handler_count(names::CHAT_MESSAGE), 1);
    }

    #[test]
    fn test_whitelist_filters_plugins() {
        let plugins: Vec<Box<dyn GatePlugin>> = vec![
            Box::new(Counting { name: "a", handlers: 1 }),
            Box::new(Counting { name: "b", handlers: 1 }),
        ];
        let mut manager = PluginManager::default().with_whitelist(["b", "missing"]);
        let summary = manager.load_all(&plugins);

        assert_eq!(summary.loaded, vec!["b"]);
        assert_eq!(summary.skipped, vec!["a"]);
    }

    #[test]
    fn test_duplicate_plugin_rejected() {
        let plugin = Counting { name: "dup", handlers: 1 };
        let mut manager = PluginManager::default();
        manager.load_plugin(&plugin).unwrap();
        assert!(manager.load_plugin(&plugin).is_err());
        assert_eq!(manager.plugin_count(), 1);
    }
}
