use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::ConfigManager;
use crate::event::{EventBus, EventDraft, SystemEvent};
use crate::kernel::error::{Error, Result};
use crate::plugin_system::context::{PluginContext, PluginPaths};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::PluginLoader;
use crate::plugin_system::manifest::{PluginCategory, PluginManifest};
use crate::plugin_system::traits::{Plugin, PluginStatus};
use crate::service::ServiceContainer;

const EVENT_SOURCE: &str = "plugin-registry";

/// Options for [`PluginRegistry::register_plugin`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterOptions {
    /// Re-register a plugin that is already active
    pub force_reload: bool,
    /// Configuration handed to `init`; defaults to the `plugins.<id>.` keys
    pub config: Option<Value>,
}

impl RegisterOptions {
    pub fn force_reload() -> Self {
        Self { force_reload: true, config: None }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }
}

/// Registry record for one plugin id
#[derive(Clone)]
pub struct PluginInfo {
    pub manifest: PluginManifest,
    pub instance: Option<Arc<dyn Plugin>>,
    pub status: PluginStatus,
    pub load_time: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    /// Failures across every registration attempt of this id
    pub error_count: u32,
    pub last_error: Option<String>,
}

impl fmt::Debug for PluginInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInfo")
            .field("id", &self.manifest.id)
            .field("version", &self.manifest.version)
            .field("status", &self.status)
            .field("has_instance", &self.instance.is_some())
            .field("error_count", &self.error_count)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl PluginInfo {
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    pub fn is_active(&self) -> bool {
        self.status == PluginStatus::Active
    }
}

/// Counts reported in the kernel status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginStatistics {
    pub total: usize,
    pub active: usize,
    pub loading: usize,
    pub error: usize,
    pub disabled: usize,
    pub unloaded: usize,
    pub total_errors: u64,
    /// Active plugins per category
    pub by_category: BTreeMap<String, usize>,
}

struct Entry {
    info: PluginInfo,
    /// Position of the latest registration; drives reverse-order shutdown
    sequence: u64,
}

#[derive(Default)]
struct RegistryState {
    plugins: HashMap<String, Entry>,
    /// Ids with a registration in flight
    pending: HashSet<String>,
    next_sequence: u64,
    loader: Option<Arc<dyn PluginLoader>>,
}

impl RegistryState {
    fn is_active(&self, id: &str) -> bool {
        self.plugins.get(id).is_some_and(|entry| entry.info.is_active())
    }

    fn ordered(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.plugins.values().collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries
    }
}

/// Holds an id in `RegistryState::pending` until the registration that
/// reserved it finishes, fails or is dropped.
struct Reservation {
    state: Arc<Mutex<RegistryState>>,
    id: String,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).pending.remove(&self.id);
    }
}

/// Owns every plugin instance and drives its callbacks.
///
/// Cloning yields another handle onto the same registry. No lock is held
/// while a plugin callback runs.
#[derive(Clone)]
pub struct PluginRegistry {
    state: Arc<Mutex<RegistryState>>,
    events: EventBus,
    services: ServiceContainer,
    config: ConfigManager,
    paths: PluginPaths,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        let ids: Vec<&str> = state.ordered().into_iter().map(|entry| entry.info.id()).collect();
        f.debug_struct("PluginRegistry")
            .field("plugins", &ids)
            .field("has_loader", &state.loader.is_some())
            .field("paths", &self.paths)
            .finish()
    }
}

impl PluginRegistry {
    pub fn new(events: EventBus, services: ServiceContainer, config: ConfigManager, paths: PluginPaths) -> Self {
        Self {
            state: Arc::new(Mutex::new(RegistryState::default())),
            events,
            services,
            config,
            paths,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn emit(&self, event: SystemEvent, data: Value) {
        let draft = EventDraft::system(event, EVENT_SOURCE).with_data(data);
        if let Err(e) = self.events.publish(draft).await {
            log::warn!("Failed to publish '{}': {}", event, e);
        }
    }

    /// Apply `change` to a stored record and return the updated copy.
    fn update<F: FnOnce(&mut PluginInfo)>(&self, id: &str, change: F) -> Option<PluginInfo> {
        let mut state = self.lock();
        let entry = state.plugins.get_mut(id)?;
        change(&mut entry.info);
        Some(entry.info.clone())
    }

    pub fn set_loader(&self, loader: Arc<dyn PluginLoader>) {
        self.lock().loader = Some(loader);
    }

    pub fn has_loader(&self) -> bool {
        self.lock().loader.is_some()
    }

    pub fn paths(&self) -> &PluginPaths {
        &self.paths
    }

    /// Validate, initialize and start a plugin instance.
    ///
    /// An already active plugin is returned unchanged unless
    /// `force_reload` is set, in which case its previous instance is
    /// cleaned up before the new one initializes. Dependencies must already
    /// be active; otherwise nothing is stored. While one registration of an
    /// id is in flight, others fail with `AlreadyRegistered`.
    pub async fn register_plugin(&self, instance: Arc<dyn Plugin>, options: RegisterOptions) -> Result<PluginInfo> {
        let manifest = instance.manifest().clone();
        let id = manifest.id.clone();

        let (previous, _reservation) = {
            let mut state = self.lock();
            if state.pending.contains(&id) {
                return Err(PluginSystemError::AlreadyRegistered { plugin_id: id }.into());
            }
            let previous = match state.plugins.get(&id) {
                Some(entry) if entry.info.is_active() && !options.force_reload => {
                    log::debug!("Plugin '{}' is already active; keeping the existing registration", id);
                    return Ok(entry.info.clone());
                }
                Some(entry) => Some(entry.info.clone()),
                None => None,
            };
            state.pending.insert(id.clone());
            (previous, Reservation { state: Arc::clone(&self.state), id: id.clone() })
        };

        manifest.validate()?;
        self.emit(
            SystemEvent::PluginRegistering,
            json!({ "id": id, "version": manifest.version, "forceReload": options.force_reload }),
        )
        .await;

        let config = options.config.unwrap_or_else(|| self.config.plugin_config(&id));
        instance.validate_config(&config).map_err(|e| PluginSystemError::InvalidConfig {
            plugin_id: id.clone(),
            message: e.to_string(),
        })?;

        {
            let state = self.lock();
            if let Some(missing) = manifest.dependencies.iter().find(|dep| !state.is_active(dep)) {
                log::warn!("Plugin '{}' cannot register: dependency '{}' is not active", id, missing);
                return Err(PluginSystemError::MissingDependency {
                    plugin_id: id.clone(),
                    dependency: missing.clone(),
                }
                .into());
            }
        }

        if let Some(previous) = &previous {
            self.teardown_previous(previous).await;
        }

        let now = Utc::now();
        let info = PluginInfo {
            manifest: manifest.clone(),
            instance: Some(Arc::clone(&instance)),
            status: PluginStatus::Loading,
            load_time: now,
            last_used: now,
            error_count: previous.as_ref().map_or(0, |p| p.error_count),
            last_error: None,
        };
        {
            let mut state = self.lock();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.plugins.insert(id.clone(), Entry { info, sequence });
        }

        let context = PluginContext::new(
            &id,
            self.events.clone(),
            self.services.clone(),
            self.config.clone(),
            &self.paths,
        );
        let outcome = match instance.init(context, config).await {
            Ok(()) => instance.start().await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                let info = self
                    .update(&id, |info| info.status = PluginStatus::Active)
                    .ok_or_else(|| PluginSystemError::PluginNotFound { plugin_id: id.clone() })?;
                log::info!("Registered plugin '{}' v{} ({})", id, manifest.version, manifest.category);
                self.emit(
                    SystemEvent::PluginRegistered,
                    json!({ "id": id, "version": manifest.version, "category": manifest.category }),
                )
                .await;
                Ok(info)
            }
            Err(e) => Err(self.record_init_failure(&id, e).await),
        }
    }

    async fn teardown_previous(&self, previous: &PluginInfo) {
        let Some(old) = &previous.instance else { return };
        log::info!("Reloading plugin '{}'; cleaning up the previous instance", previous.id());
        if previous.is_active() {
            if let Err(e) = old.stop().await {
                log::warn!("Previous instance of '{}' failed to stop: {}", previous.id(), e);
            }
        }
        if let Err(e) = old.cleanup().await {
            log::warn!("Previous instance of '{}' failed to clean up: {}", previous.id(), e);
        }
    }

    async fn record_init_failure(&self, id: &str, error: Error) -> Error {
        let message = error.to_string();
        let error_count = self
            .update(id, |info| {
                info.status = PluginStatus::Error;
                info.error_count += 1;
                info.last_error = Some(message.clone());
            })
            .map_or(1, |info| info.error_count);
        log::error!("Plugin '{}' failed to initialize: {}", id, message);
        self.emit(
            SystemEvent::PluginRegisterError,
            json!({ "id": id, "error": message, "errorCount": error_count }),
        )
        .await;
        PluginSystemError::InitializationError {
            plugin_id: id.to_string(),
            message,
            source: Some(Box::new(error)),
        }
        .into()
    }

    /// Instantiate a plugin through the configured loader, then register it.
    pub async fn load_plugin(&self, manifest: PluginManifest, options: RegisterOptions) -> Result<PluginInfo> {
        self.emit(
            SystemEvent::PluginLoading,
            json!({ "id": manifest.id, "entryPoint": manifest.entry_point }),
        )
        .await;

        match self.load_and_register(&manifest, options).await {
            Ok(info) => {
                self.emit(SystemEvent::PluginLoaded, json!({ "id": manifest.id })).await;
                Ok(info)
            }
            Err(e) => {
                log::error!("Failed to load plugin '{}': {}", manifest.id, e);
                self.emit(
                    SystemEvent::PluginLoadError,
                    json!({ "id": manifest.id, "error": e.to_string() }),
                )
                .await;
                Err(e)
            }
        }
    }

    async fn load_and_register(&self, manifest: &PluginManifest, options: RegisterOptions) -> Result<PluginInfo> {
        manifest.validate()?;
        let loader = self
            .lock()
            .loader
            .clone()
            .ok_or_else(|| PluginSystemError::LoaderUnavailable { plugin_id: manifest.id.clone() })?;

        let instance = loader.load(manifest).await?;
        let loaded_id = instance.manifest().id.clone();
        if loaded_id != manifest.id {
            return Err(PluginSystemError::LoadingError {
                plugin_id: manifest.id.clone(),
                entry_point: manifest.entry_point.clone(),
                message: format!("loader produced plugin '{}'", loaded_id),
            }
            .into());
        }
        self.register_plugin(instance, options).await
    }

    /// Stop and clean up a plugin, then drop its instance.
    ///
    /// Returns `false` when no instance is held for `id`. Plugins that
    /// depend on this one are left as they are.
    pub async fn unload_plugin(&self, id: &str) -> Result<bool> {
        let (instance, was_active) = {
            let state = self.lock();
            match state.plugins.get(id).and_then(|entry| entry.info.instance.clone().map(|i| (i, entry.info.is_active()))) {
                Some(found) => found,
                None => return Ok(false),
            }
        };

        self.emit(SystemEvent::PluginUnloading, json!({ "id": id })).await;

        if was_active {
            if let Err(e) = instance.stop().await {
                log::warn!("Plugin '{}' failed to stop before unload: {}", id, e);
            }
        }

        if let Err(e) = instance.cleanup().await {
            let message = e.to_string();
            self.update(id, |info| {
                info.status = PluginStatus::Error;
                info.error_count += 1;
                info.last_error = Some(message.clone());
            });
            log::error!("Plugin '{}' failed to clean up: {}", id, message);
            self.emit(SystemEvent::PluginUnloadError, json!({ "id": id, "error": message })).await;
            return Err(PluginSystemError::CleanupError { plugin_id: id.to_string(), source: Box::new(e) }.into());
        }

        self.update(id, |info| {
            info.status = PluginStatus::Unloaded;
            info.instance = None;
        });
        log::info!("Unloaded plugin '{}'", id);
        self.emit(SystemEvent::PluginUnloaded, json!({ "id": id })).await;
        Ok(true)
    }

    /// Stop every active plugin, most recently registered first, marking
    /// each `disabled`. Returns how many failed to stop.
    pub async fn stop_all(&self) -> usize {
        let active: Vec<(String, Arc<dyn Plugin>)> = {
            let state = self.lock();
            state
                .ordered()
                .into_iter()
                .rev()
                .filter(|entry| entry.info.is_active())
                .filter_map(|entry| entry.info.instance.clone().map(|i| (entry.info.id().to_string(), i)))
                .collect()
        };

        let mut failures = 0;
        for (id, instance) in active {
            match instance.stop().await {
                Ok(()) => {
                    self.update(&id, |info| info.status = PluginStatus::Disabled);
                    log::debug!("Stopped plugin '{}'", id);
                    self.emit(
                        SystemEvent::PluginStatusChanged,
                        json!({ "id": id, "from": PluginStatus::Active, "to": PluginStatus::Disabled }),
                    )
                    .await;
                }
                Err(e) => {
                    failures += 1;
                    let message = e.to_string();
                    self.update(&id, |info| {
                        info.status = PluginStatus::Error;
                        info.error_count += 1;
                        info.last_error = Some(message.clone());
                    });
                    log::error!("Plugin '{}' failed to stop: {}", id, message);
                }
            }
        }
        failures
    }

    /// Start every plugin left `disabled` by [`PluginRegistry::stop_all`],
    /// oldest registration first. Returns how many failed to start.
    pub async fn start_all(&self) -> usize {
        let disabled: Vec<(String, Arc<dyn Plugin>)> = {
            let state = self.lock();
            state
                .ordered()
                .into_iter()
                .filter(|entry| entry.info.status == PluginStatus::Disabled)
                .filter_map(|entry| entry.info.instance.clone().map(|i| (entry.info.id().to_string(), i)))
                .collect()
        };

        let mut failures = 0;
        for (id, instance) in disabled {
            match instance.start().await {
                Ok(()) => {
                    self.update(&id, |info| info.status = PluginStatus::Active);
                    log::debug!("Restarted plugin '{}'", id);
                    self.emit(
                        SystemEvent::PluginStatusChanged,
                        json!({ "id": id, "from": PluginStatus::Disabled, "to": PluginStatus::Active }),
                    )
                    .await;
                }
                Err(e) => {
                    failures += 1;
                    let message = e.to_string();
                    self.update(&id, |info| {
                        info.status = PluginStatus::Error;
                        info.error_count += 1;
                        info.last_error = Some(message.clone());
                    });
                    log::error!("Plugin '{}' failed to restart: {}", id, message);
                }
            }
        }
        failures
    }

    /// Look up a plugin and mark it as used.
    pub fn plugin(&self, id: &str) -> Option<PluginInfo> {
        self.update(id, |info| info.last_used = Utc::now())
    }

    pub fn instance(&self, id: &str) -> Option<Arc<dyn Plugin>> {
        self.lock().plugins.get(id).and_then(|entry| entry.info.instance.clone())
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.lock().is_active(id)
    }

    /// Every known plugin in registration order
    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.lock().ordered().into_iter().map(|entry| entry.info.clone()).collect()
    }

    /// Active plugins of one category
    pub fn plugins_by_category(&self, category: PluginCategory) -> Vec<PluginInfo> {
        self.active_matching(|info| info.manifest.category == category)
    }

    /// Active plugins carrying a tag
    pub fn plugins_by_tag(&self, tag: &str) -> Vec<PluginInfo> {
        self.active_matching(|info| info.manifest.has_tag(tag))
    }

    fn active_matching<F: Fn(&PluginInfo) -> bool>(&self, predicate: F) -> Vec<PluginInfo> {
        self.lock()
            .ordered()
            .into_iter()
            .filter(|entry| entry.info.is_active() && predicate(&entry.info))
            .map(|entry| entry.info.clone())
            .collect()
    }

    /// Overwrite a plugin's status. No plugin callback is invoked.
    pub async fn set_plugin_status(&self, id: &str, status: PluginStatus) -> bool {
        let mut previous = None;
        let updated = self.update(id, |info| {
            previous = Some(info.status);
            info.status = status;
        });
        if updated.is_none() {
            return false;
        }
        self.emit(
            SystemEvent::PluginStatusChanged,
            json!({ "id": id, "from": previous, "to": status }),
        )
        .await;
        true
    }

    pub fn statistics(&self) -> PluginStatistics {
        let state = self.lock();
        let mut stats = PluginStatistics { total: state.plugins.len(), ..PluginStatistics::default() };
        for entry in state.plugins.values() {
            let info = &entry.info;
            stats.total_errors += u64::from(info.error_count);
            match info.status {
                PluginStatus::Active => {
                    stats.active += 1;
                    *stats.by_category.entry(info.manifest.category.to_string()).or_default() += 1;
                }
                PluginStatus::Loading => stats.loading += 1,
                PluginStatus::Error => stats.error += 1,
                PluginStatus::Disabled => stats.disabled += 1,
                PluginStatus::Unloaded => stats.unloaded += 1,
            }
        }
        stats
    }
}
