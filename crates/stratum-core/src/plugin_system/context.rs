use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::config::ConfigManager;
use crate::event::{Event, EventBus, EventDraft};
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::service::ServiceContainer;

/// Base directories under which each plugin gets its own subdirectory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginPaths {
    pub plugins_dir: PathBuf,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl PluginPaths {
    pub fn new(plugins_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            data_dir: data_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Read `plugins.dir`, `data.dir` and `cache.dir`, falling back to the
    /// built-in defaults.
    pub fn from_config(config: &ConfigManager) -> Self {
        Self::new(
            config.get_or("plugins.dir", constants::DEFAULT_PLUGINS_DIR.to_string()),
            config.get_or("data.dir", constants::DEFAULT_DATA_DIR.to_string()),
            config.get_or("cache.dir", constants::DEFAULT_CACHE_DIR.to_string()),
        )
    }
}

impl Default for PluginPaths {
    fn default() -> Self {
        Self::new(
            constants::DEFAULT_PLUGINS_DIR,
            constants::DEFAULT_DATA_DIR,
            constants::DEFAULT_CACHE_DIR,
        )
    }
}

/// Everything a plugin receives at `init`.
///
/// Directories are only computed, never created; a plugin that needs one
/// creates it itself.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub plugin_id: String,
    pub events: EventBus,
    pub services: ServiceContainer,
    pub config: ConfigManager,
    pub plugin_dir: PathBuf,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl PluginContext {
    pub fn new(
        plugin_id: &str,
        events: EventBus,
        services: ServiceContainer,
        config: ConfigManager,
        paths: &PluginPaths,
    ) -> Self {
        Self {
            plugin_id: plugin_id.to_string(),
            events,
            services,
            config,
            plugin_dir: paths.plugins_dir.join(plugin_id),
            data_dir: paths.data_dir.join(plugin_id),
            cache_dir: paths.cache_dir.join(plugin_id),
        }
    }

    /// Publish an event with this plugin as its source.
    pub async fn publish(&self, event_type: &str, data: Value) -> Result<Arc<Event>> {
        self.events
            .publish(EventDraft::new(event_type, self.plugin_id.as_str()).with_data(data))
            .await
    }

    /// Configuration keys under `plugins.<plugin id>.`
    pub fn plugin_config(&self) -> Value {
        self.config.plugin_config(&self.plugin_id)
    }

    pub fn data_path(&self, file: impl AsRef<Path>) -> PathBuf {
        self.data_dir.join(file)
    }
}
