use std::any::Any;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::{ConfigManager, ConfigSource, ConfigStatistics};
use crate::event::{Event, EventBus, EventDraft, EventHandler, SubscriptionId, SystemEvent};
use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::lifecycle::{HookDirection, HookSpec, LifecycleError, LifecycleManager, LifecycleStatistics};
use crate::plugin_system::{
    Plugin, PluginCategory, PluginInfo, PluginManifest, PluginPaths, PluginRegistry, PluginStatistics,
    RegisterOptions,
};
use crate::service::{ServiceContainer, ServiceOptions, ServiceStatistics};

const EVENT_SOURCE: &str = "kernel";

/// Subscribing to this type through the kernel delivers every event
pub const ALL_EVENTS: &str = "*";

/// Options used when building a [`Kernel`]
#[derive(Debug, Clone)]
pub struct KernelOptions {
    /// History capacity of a kernel-built event bus
    pub max_history_size: usize,
    /// Read `<env_prefix>_*` variables as a configuration source
    pub load_environment: bool,
    pub env_prefix: String,
    /// Files added as configuration sources, in order
    pub config_files: Vec<PathBuf>,
    /// Plugin directories; derived from configuration when `None`
    pub plugin_paths: Option<PluginPaths>,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            max_history_size: constants::DEFAULT_HISTORY_SIZE,
            load_environment: true,
            env_prefix: constants::ENV_PREFIX.to_string(),
            config_files: Vec::new(),
            plugin_paths: None,
        }
    }
}

impl KernelOptions {
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_files.push(path.into());
        self
    }

    pub fn with_plugin_paths(mut self, paths: PluginPaths) -> Self {
        self.plugin_paths = Some(paths);
        self
    }

    pub fn without_environment(mut self) -> Self {
        self.load_environment = false;
        self
    }
}

/// Snapshot returned by [`Kernel::status`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KernelStatus {
    pub name: String,
    pub version: String,
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_ms: Option<u64>,
    pub plugins: PluginStatistics,
    pub services: ServiceStatistics,
    pub config: ConfigStatistics,
    pub lifecycle: LifecycleStatistics,
    pub event_history: usize,
    pub subscriptions: usize,
}

#[derive(Default)]
struct RunState {
    started: Option<(Instant, DateTime<Utc>)>,
}

struct KernelInner {
    events: EventBus,
    services: ServiceContainer,
    config: ConfigManager,
    plugins: PluginRegistry,
    lifecycle: LifecycleManager,
    state: Mutex<RunState>,
}

/// Non-owning handle registered under the `kernel` service id.
///
/// Services and plugins resolve it and upgrade when they need the facade,
/// so the container never keeps the kernel alive.
#[derive(Debug, Clone)]
pub struct KernelHandle(Weak<KernelInner>);

impl KernelHandle {
    pub fn upgrade(&self) -> Option<Kernel> {
        self.0.upgrade().map(|inner| Kernel { inner })
    }
}

/// Facade over the core components.
///
/// Cloning yields another handle onto the same kernel.
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<KernelInner>,
}

impl fmt::Debug for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kernel")
            .field("running", &self.is_running())
            .field("plugins", &self.inner.plugins)
            .field("lifecycle", &self.inner.lifecycle)
            .finish()
    }
}

impl Kernel {
    /// Build a kernel with freshly constructed components.
    pub async fn new(options: KernelOptions) -> Result<Self> {
        let events = EventBus::with_max_history_size(options.max_history_size);
        let services = ServiceContainer::with_event_bus(events.clone());
        let config = ConfigManager::with_event_bus(events.clone());
        Self::with_components(events, services, config, options).await
    }

    /// Build a kernel around explicitly constructed components.
    pub async fn with_components(
        events: EventBus,
        services: ServiceContainer,
        config: ConfigManager,
        options: KernelOptions,
    ) -> Result<Self> {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);

        config.add_source(ConfigSource::defaults()).await;
        if options.load_environment {
            config.add_source(ConfigSource::from_env(&options.env_prefix)).await;
        }
        for path in &options.config_files {
            let source = ConfigSource::from_file(path, constants::CONFIG_FILE_PRIORITY).await?;
            config.add_source(source).await;
        }

        let paths = options.plugin_paths.unwrap_or_else(|| PluginPaths::from_config(&config));
        log::debug!("Plugin directory: {}", paths.plugins_dir.display());
        let plugins = PluginRegistry::new(events.clone(), services.clone(), config.clone(), paths);
        let lifecycle = LifecycleManager::with_event_bus(events.clone());

        let kernel = Kernel {
            inner: Arc::new(KernelInner {
                events,
                services,
                config,
                plugins,
                lifecycle,
                state: Mutex::new(RunState::default()),
            }),
        };
        kernel.register_components().await?;
        kernel.register_hooks().await?;
        Ok(kernel)
    }

    async fn register_components(&self) -> Result<()> {
        let inner = &self.inner;
        let services = &inner.services;
        services
            .register_instance(constants::KERNEL_SERVICE, KernelHandle(Arc::downgrade(inner)))
            .await?;
        services.register_instance(constants::EVENT_BUS_SERVICE, inner.events.clone()).await?;
        services
            .register_instance(constants::SERVICE_CONTAINER_SERVICE, services.clone())
            .await?;
        services
            .register_instance(constants::PLUGIN_REGISTRY_SERVICE, inner.plugins.clone())
            .await?;
        services
            .register_instance(constants::LIFECYCLE_MANAGER_SERVICE, inner.lifecycle.clone())
            .await?;
        services
            .register_instance(constants::CONFIG_MANAGER_SERVICE, inner.config.clone())
            .await?;
        Ok(())
    }

    async fn register_hooks(&self) -> Result<()> {
        let services = self.inner.services.clone();
        let validate = HookSpec::new("services", move || {
            let services = services.clone();
            async move {
                let report = services.validate_dependencies();
                for cycle in &report.cycles {
                    log::warn!("Circular service dependency: {}", crate::utils::format_path(cycle));
                }
                Ok(())
            }
        })
        .with_id("kernel.validate-services")
        .direction(HookDirection::Startup)
        .priority(100);
        self.inner.lifecycle.register_hook(validate).await?;

        let plugins = self.inner.plugins.clone();
        let start_plugins = HookSpec::new("plugins", move || {
            let plugins = plugins.clone();
            async move {
                let failures = plugins.start_all().await;
                if failures > 0 {
                    log::warn!("{} plugin(s) failed to restart", failures);
                }
                Ok(())
            }
        })
        .with_id("kernel.start-plugins")
        .direction(HookDirection::Startup)
        .priority(-100);
        self.inner.lifecycle.register_hook(start_plugins).await?;

        let plugins = self.inner.plugins.clone();
        let stop_plugins = HookSpec::new("plugins", move || {
            let plugins = plugins.clone();
            async move {
                let failures = plugins.stop_all().await;
                if failures > 0 {
                    log::warn!("{} plugin(s) failed to stop", failures);
                }
                Ok(())
            }
        })
        .with_id("kernel.stop-plugins")
        .direction(HookDirection::Shutdown)
        .priority(-100);
        self.inner.lifecycle.register_hook(stop_plugins).await?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn emit(&self, event: SystemEvent, data: Value) {
        if let Err(e) = self.inner.events.publish(EventDraft::system(event, EVENT_SOURCE).with_data(data)).await {
            log::warn!("Failed to publish '{}': {}", event, e);
        }
    }

    /// Run the lifecycle startup phases.
    pub async fn start(&self) -> Result<()> {
        if self.is_running() {
            return Err(LifecycleError::AlreadyRunning { component: "kernel".to_string() }.into());
        }
        self.inner.lifecycle.start().await?;

        let started_at = Utc::now();
        self.lock().started = Some((Instant::now(), started_at));
        log::info!("{} started", constants::APP_NAME);
        self.emit(
            SystemEvent::KernelStarted,
            json!({ "version": constants::APP_VERSION, "startedAt": started_at }),
        )
        .await;
        Ok(())
    }

    /// Run the lifecycle shutdown phases. Stopping a stopped kernel does nothing.
    pub async fn stop(&self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }
        self.inner.lifecycle.stop().await?;

        let uptime = self.lock().started.take().map(|(at, _)| at.elapsed());
        let uptime_ms = uptime.map_or(0, |d| d.as_millis() as u64);
        log::info!("{} stopped after {}ms", constants::APP_NAME, uptime_ms);
        self.emit(SystemEvent::KernelStopped, json!({ "uptimeMs": uptime_ms })).await;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lock().started.is_some()
    }

    pub fn uptime(&self) -> Result<Duration> {
        self.lock()
            .started
            .map(|(at, _)| at.elapsed())
            .ok_or_else(|| LifecycleError::NotRunning { component: "kernel".to_string() }.into())
    }

    pub async fn register_plugin(&self, plugin: Arc<dyn Plugin>, options: RegisterOptions) -> Result<PluginInfo> {
        self.inner.plugins.register_plugin(plugin, options).await
    }

    pub async fn load_plugin(&self, manifest: PluginManifest, options: RegisterOptions) -> Result<PluginInfo> {
        self.inner.plugins.load_plugin(manifest, options).await
    }

    pub async fn unload_plugin(&self, id: &str) -> Result<bool> {
        self.inner.plugins.unload_plugin(id).await
    }

    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.inner.plugins.plugins()
    }

    pub fn plugins_by_category(&self, category: PluginCategory) -> Vec<PluginInfo> {
        self.inner.plugins.plugins_by_category(category)
    }

    pub async fn get_service<T: Any + Send + Sync>(&self, id: &str) -> Result<Arc<T>> {
        self.inner.services.resolve::<T>(id).await
    }

    pub async fn register_service<T, F, Fut>(&self, id: &str, factory: F, options: ServiceOptions) -> Result<()>
    where
        T: Any + Send + Sync,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.inner.services.register(id, factory, options).await
    }

    pub fn get_config<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.inner.config.get(key)
    }

    pub async fn set_config<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        self.inner.config.set(key, value).await
    }

    pub async fn publish_event(&self, event_type: &str, data: Value) -> Result<Arc<Event>> {
        self.inner.events.publish(EventDraft::new(event_type, EVENT_SOURCE).with_data(data)).await
    }

    /// Subscribe to one event type, or to every event with [`ALL_EVENTS`].
    pub fn subscribe_to_events(&self, event_type: &str, handler: Arc<dyn EventHandler>, priority: i32) -> SubscriptionId {
        if event_type == ALL_EVENTS {
            self.inner.events.subscribe_to_all(handler, priority)
        } else {
            self.inner.events.subscribe(event_type, handler, priority, None)
        }
    }

    pub fn status(&self) -> KernelStatus {
        let started = self.lock().started;
        KernelStatus {
            name: constants::APP_NAME.to_string(),
            version: constants::APP_VERSION.to_string(),
            running: started.is_some(),
            started_at: started.map(|(_, at)| at),
            uptime_ms: started.map(|(at, _)| at.elapsed().as_millis() as u64),
            plugins: self.inner.plugins.statistics(),
            services: self.inner.services.statistics(),
            config: self.inner.config.statistics(),
            lifecycle: self.inner.lifecycle.statistics(),
            event_history: self.inner.events.history(None).len(),
            subscriptions: self.inner.events.subscriptions().len(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn services(&self) -> &ServiceContainer {
        &self.inner.services
    }

    pub fn config(&self) -> &ConfigManager {
        &self.inner.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.inner.plugins
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.inner.lifecycle
    }

    /// Non-owning handle onto this kernel
    pub fn handle(&self) -> KernelHandle {
        KernelHandle(Arc::downgrade(&self.inner))
    }
}
