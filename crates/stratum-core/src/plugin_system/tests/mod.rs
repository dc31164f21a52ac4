// Plugin system test module
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ConfigManager;
use crate::event::EventBus;
use crate::kernel::error::{Error, Result};
use crate::plugin_system::{
    ManifestBuilder, Plugin, PluginCategory, PluginContext, PluginManifest, PluginPaths, PluginRegistry,
};
use crate::service::ServiceContainer;


pub(super) type CallLog = Arc<Mutex<Vec<String>>>;

pub(super) fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub(super) fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Plugin double recording every callback as `<id>:<callback>`
pub(super) struct MockPlugin {
    manifest: PluginManifest,
    log: CallLog,
    fail_init: bool,
    fail_start: bool,
    fail_stop: bool,
    fail_cleanup: bool,
    reject_config: bool,
    pub received_config: Mutex<Option<Value>>,
    pub context: Mutex<Option<PluginContext>>,
}

impl MockPlugin {
    pub fn new(id: &str, dependencies: &[&str], log: &CallLog) -> Self {
        let mut builder = ManifestBuilder::new(id, &format!("Mock {}", id), "1.0.0")
            .category(PluginCategory::Utility)
            .tags(&["mock"]);
        for dependency in dependencies {
            builder = builder.dependency(dependency);
        }
        Self::with_manifest(builder.build(), log)
    }

    pub fn with_manifest(manifest: PluginManifest, log: &CallLog) -> Self {
        Self {
            manifest,
            log: Arc::clone(log),
            fail_init: false,
            fail_start: false,
            fail_stop: false,
            fail_cleanup: false,
            reject_config: false,
            received_config: Mutex::new(None),
            context: Mutex::new(None),
        }
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    pub fn failing_cleanup(mut self) -> Self {
        self.fail_cleanup = true;
        self
    }

    pub fn rejecting_config(mut self) -> Self {
        self.reject_config = true;
        self
    }

    fn record(&self, callback: &str) {
        self.log.lock().unwrap().push(format!("{}:{}", self.manifest.id, callback));
    }

    fn outcome(&self, callback: &str, fail: bool) -> Result<()> {
        self.record(callback);
        if fail {
            Err(Error::from(format!("{} failed", callback)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    async fn init(&self, context: PluginContext, config: Value) -> Result<()> {
        *self.received_config.lock().unwrap() = Some(config);
        *self.context.lock().unwrap() = Some(context);
        self.outcome("init", self.fail_init)
    }

    async fn start(&self) -> Result<()> {
        self.outcome("start", self.fail_start)
    }

    async fn stop(&self) -> Result<()> {
        self.outcome("stop", self.fail_stop)
    }

    async fn cleanup(&self) -> Result<()> {
        self.outcome("cleanup", self.fail_cleanup)
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        if self.reject_config {
            return Err(Error::from(format!("rejected config {}", config)));
        }
        Ok(())
    }
}

pub(super) struct Harness {
    pub bus: EventBus,
    pub config: ConfigManager,
    pub registry: PluginRegistry,
}

pub(super) fn harness() -> Harness {
    let bus = EventBus::new();
    let config = ConfigManager::with_event_bus(bus.clone());
    let services = ServiceContainer::with_event_bus(bus.clone());
    let registry = PluginRegistry::new(
        bus.clone(),
        services,
        config.clone(),
        PluginPaths::new("/opt/stratum/plugins", "/var/lib/stratum", "/var/cache/stratum"),
    );
    Harness { bus, config, registry }
}

/// Event types recorded on the bus, in publish order
pub(super) fn event_types(bus: &EventBus) -> Vec<String> {
    bus.history(None).iter().map(|e| e.event_type.clone()).collect()
}
