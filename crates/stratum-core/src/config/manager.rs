use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::data::{nest, ConfigData};
use crate::config::source::ConfigSource;
use crate::event::{EventBus, EventDraft, SystemEvent};
use crate::kernel::error::Result;

const EVENT_SOURCE: &str = "config-manager";

/// Counts reported in the kernel status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ConfigStatistics {
    pub sources: usize,
    pub keys: usize,
    pub overrides: usize,
}

#[derive(Default)]
struct ConfigState {
    /// Kept sorted by descending priority
    sources: Vec<ConfigSource>,
    /// Runtime values set through [`ConfigManager::set`]; outrank every source
    overrides: ConfigData,
}

impl ConfigState {
    fn lookup(&self, key: &str) -> Option<&Value> {
        self.overrides
            .get_value(key)
            .or_else(|| self.sources.iter().find_map(|source| source.data.get_value(key)))
    }

    fn keys(&self) -> BTreeSet<String> {
        self.sources
            .iter()
            .flat_map(|source| source.data.keys())
            .chain(self.overrides.keys())
            .collect()
    }
}

/// Layered configuration shared by the kernel and every plugin.
///
/// Lookups consult runtime overrides first, then sources by descending
/// priority. Cloning yields another handle onto the same layers.
#[derive(Clone)]
pub struct ConfigManager {
    state: Arc<Mutex<ConfigState>>,
    events: Option<EventBus>,
}

impl fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        let sources: Vec<(&str, i32)> = state.sources.iter().map(|s| (s.name.as_str(), s.priority)).collect();
        f.debug_struct("ConfigManager")
            .field("sources", &sources)
            .field("overrides", &state.overrides.len())
            .finish()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self { state: Arc::new(Mutex::new(ConfigState::default())), events: None }
    }

    pub fn with_event_bus(events: EventBus) -> Self {
        Self { state: Arc::new(Mutex::new(ConfigState::default())), events: Some(events) }
    }

    fn lock(&self) -> MutexGuard<'_, ConfigState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn emit(&self, event: SystemEvent, data: Value) {
        if let Some(bus) = &self.events {
            if let Err(e) = bus.publish(EventDraft::system(event, EVENT_SOURCE).with_data(data)).await {
                log::warn!("Failed to publish '{}': {}", event, e);
            }
        }
    }

    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.get_value(key).and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn get_or<T: for<'de> Deserialize<'de>>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Effective raw value for a key
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.lock().lookup(key).cloned()
    }

    /// Set a runtime override and announce it with `config.changed`.
    pub async fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let (old_value, new_value) = {
            let mut state = self.lock();
            let old_value = state.lookup(key).cloned();
            state.overrides.set(key, value)?;
            (old_value, state.overrides.get_value(key).cloned())
        };
        log::debug!("Configuration '{}' changed", key);
        self.emit(
            SystemEvent::ConfigChanged,
            json!({ "key": key, "oldValue": old_value, "newValue": new_value }),
        )
        .await;
        Ok(())
    }

    /// Add a source, replacing any source with the same name.
    pub async fn add_source(&self, source: ConfigSource) {
        let (name, priority, keys) = (source.name.clone(), source.priority, source.data.len());
        {
            let mut state = self.lock();
            state.sources.retain(|existing| existing.name != source.name);
            // Stable: equal priorities keep insertion order
            let position = state
                .sources
                .iter()
                .position(|existing| existing.priority < source.priority)
                .unwrap_or(state.sources.len());
            state.sources.insert(position, source);
        }
        log::debug!("Added configuration source '{}' (priority {}, {} keys)", name, priority, keys);
        self.emit(
            SystemEvent::ConfigSourceAdded,
            json!({ "name": name, "priority": priority, "keys": keys }),
        )
        .await;
    }

    pub async fn remove_source(&self, name: &str) -> bool {
        let removed = {
            let mut state = self.lock();
            let before = state.sources.len();
            state.sources.retain(|source| source.name != name);
            state.sources.len() < before
        };
        if removed {
            self.emit(SystemEvent::ConfigSourceRemoved, json!({ "name": name })).await;
        }
        removed
    }

    /// Source names with their priorities, highest first
    pub fn sources(&self) -> Vec<(String, i32)> {
        self.lock().sources.iter().map(|s| (s.name.clone(), s.priority)).collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().into_iter().collect()
    }

    /// Every key with its effective value
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        let state = self.lock();
        state
            .keys()
            .into_iter()
            .filter_map(|key| state.lookup(&key).cloned().map(|value| (key, value)))
            .collect()
    }

    /// Keys under `plugins.<plugin_id>.`, with the prefix removed and nested
    /// back into an object.
    pub fn plugin_config(&self, plugin_id: &str) -> Value {
        let prefix = format!("plugins.{}.", plugin_id);
        let entries = self
            .snapshot()
            .into_iter()
            .filter_map(|(key, value)| key.strip_prefix(&prefix).map(|rest| (rest.to_string(), value)));
        nest(entries)
    }

    pub fn statistics(&self) -> ConfigStatistics {
        let state = self.lock();
        ConfigStatistics {
            sources: state.sources.len(),
            keys: state.keys().len(),
            overrides: state.overrides.len(),
        }
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
