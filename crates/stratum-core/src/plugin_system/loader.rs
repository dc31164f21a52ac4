use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::kernel::error::Result;
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::manifest::PluginManifest;
use crate::plugin_system::traits::Plugin;

/// Turns a manifest into a plugin instance.
#[async_trait]
pub trait PluginLoader: Send + Sync {
    async fn load(&self, manifest: &PluginManifest) -> Result<Arc<dyn Plugin>>;
}

/// Builds a plugin instance from its manifest
pub type PluginConstructor = Arc<dyn Fn(&PluginManifest) -> Result<Arc<dyn Plugin>> + Send + Sync>;

/// Loader over plugins compiled into the binary, keyed by entry point.
#[derive(Clone, Default)]
pub struct StaticPluginLoader {
    constructors: BTreeMap<String, PluginConstructor>,
}

impl fmt::Debug for StaticPluginLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticPluginLoader")
            .field("entry_points", &self.entry_points())
            .finish()
    }
}

impl StaticPluginLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map an entry point to a constructor, replacing any previous one.
    pub fn register<F>(&mut self, entry_point: &str, constructor: F) -> &mut Self
    where
        F: Fn(&PluginManifest) -> Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        if self.constructors.insert(entry_point.to_string(), Arc::new(constructor)).is_some() {
            log::warn!("Replaced plugin constructor for entry point '{}'", entry_point);
        }
        self
    }

    pub fn with<F>(mut self, entry_point: &str, constructor: F) -> Self
    where
        F: Fn(&PluginManifest) -> Result<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        self.register(entry_point, constructor);
        self
    }

    pub fn entry_points(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }
}

#[async_trait]
impl PluginLoader for StaticPluginLoader {
    async fn load(&self, manifest: &PluginManifest) -> Result<Arc<dyn Plugin>> {
        let constructor = self.constructors.get(&manifest.entry_point).ok_or_else(|| {
            PluginSystemError::LoadingError {
                plugin_id: manifest.id.clone(),
                entry_point: manifest.entry_point.clone(),
                message: "no constructor registered for this entry point".to_string(),
            }
        })?;
        log::debug!("Constructing plugin '{}' from entry point '{}'", manifest.id, manifest.entry_point);
        constructor(manifest)
    }
}
