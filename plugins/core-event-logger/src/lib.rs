//! Utility plugin that writes every event published on the bus to the log.
//!
//! Configuration (under `plugins.core-event-logger.`):
//!
//! - `level`: log level used for events, default `debug`
//! - `exclude`: event type prefixes that are not logged
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};
use stratum_core::event::{Event, EventHandler, SubscriptionId};
use stratum_core::plugin_system::{
    ManifestBuilder, Plugin, PluginCategory, PluginContext, PluginHealth, PluginManifest,
};
use stratum_core::{Error, Result};

pub const PLUGIN_ID: &str = "core-event-logger";

/// Runs after every other wildcard subscriber
const SUBSCRIPTION_PRIORITY: i32 = i32::MIN;

#[derive(Debug, Clone, PartialEq)]
struct LoggerSettings {
    level: log::Level,
    exclude: Vec<String>,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self { level: log::Level::Debug, exclude: Vec::new() }
    }
}

impl LoggerSettings {
    fn parse(config: &Value) -> Result<Self> {
        let mut settings = Self::default();
        if let Some(level) = config.get("level") {
            let name = level.as_str().ok_or("level must be a string")?;
            settings.level = log::Level::from_str(name).map_err(|_| Error::from(format!("unknown log level '{}'", name)))?;
        }
        if let Some(exclude) = config.get("exclude") {
            settings.exclude = serde_json::from_value(exclude.clone())
                .map_err(|e| Error::from(format!("exclude must be a list of prefixes: {}", e)))?;
        }
        Ok(settings)
    }
}

struct LoggingHandler {
    settings: LoggerSettings,
    logged: Arc<AtomicU64>,
}

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: Arc<Event>) -> Result<()> {
        if self.settings.exclude.iter().any(|prefix| event.event_type.starts_with(prefix.as_str())) {
            return Ok(());
        }
        log::log!(
            target: PLUGIN_ID,
            self.settings.level,
            "[{}] {} from {}: {}",
            event.timestamp.format("%H:%M:%S%.3f"),
            event.event_type,
            event.source,
            event.data
        );
        self.logged.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[derive(Default)]
struct LoggerState {
    settings: LoggerSettings,
    context: Option<PluginContext>,
    subscription: Option<SubscriptionId>,
}

pub struct EventLoggerPlugin {
    manifest: PluginManifest,
    state: Mutex<LoggerState>,
    logged: Arc<AtomicU64>,
}

impl Default for EventLoggerPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoggerPlugin {
    pub fn new() -> Self {
        let manifest = ManifestBuilder::new(PLUGIN_ID, "Event Logger", env!("CARGO_PKG_VERSION"))
            .description("Logs every event published on the bus")
            .author("Stratum")
            .category(PluginCategory::Utility)
            .tags(&["core", "logging"])
            .config_schema(json!({
                "type": "object",
                "properties": {
                    "level": { "type": "string", "enum": ["error", "warn", "info", "debug", "trace"] },
                    "exclude": { "type": "array", "items": { "type": "string" } }
                }
            }))
            .build();
        Self { manifest, state: Mutex::new(LoggerState::default()), logged: Arc::new(AtomicU64::new(0)) }
    }

    /// Events written to the log since the plugin was created
    pub fn events_logged(&self) -> u64 {
        self.logged.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, LoggerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Plugin for EventLoggerPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        LoggerSettings::parse(config).map(|_| ())
    }

    async fn init(&self, context: PluginContext, config: Value) -> Result<()> {
        let settings = LoggerSettings::parse(&config)?;
        log::debug!("{} logging events at {} level", PLUGIN_ID, settings.level);
        let mut state = self.lock();
        state.settings = settings;
        state.context = Some(context);
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let mut state = self.lock();
        let context = state.context.clone().ok_or("event logger started before init")?;
        if state.subscription.is_none() {
            let handler = LoggingHandler { settings: state.settings.clone(), logged: Arc::clone(&self.logged) };
            let id = context.events.subscribe_to_all(Arc::new(handler), SUBSCRIPTION_PRIORITY);
            state.subscription = Some(id);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut state = self.lock();
        if let (Some(id), Some(context)) = (state.subscription.take(), state.context.as_ref()) {
            context.events.unsubscribe(&id);
        }
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        let mut state = self.lock();
        if let (Some(id), Some(context)) = (state.subscription.take(), state.context.as_ref()) {
            context.events.unsubscribe(&id);
        }
        state.context = None;
        Ok(())
    }

    fn status(&self) -> PluginHealth {
        let subscribed = self.lock().subscription.is_some();
        PluginHealth::healthy().with_details(json!({
            "subscribed": subscribed,
            "eventsLogged": self.events_logged(),
        }))
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["event-logging".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_core::event::EventDraft;
    use stratum_core::plugin_system::{PluginPaths, PluginRegistry, PluginStatus, RegisterOptions};
    use stratum_core::{ConfigManager, EventBus, ServiceContainer};

    fn registry(bus: &EventBus) -> PluginRegistry {
        PluginRegistry::new(
            bus.clone(),
            ServiceContainer::new(),
            ConfigManager::new(),
            PluginPaths::new("/tmp/plugins", "/tmp/data", "/tmp/cache"),
        )
    }

    #[tokio::test]
    async fn test_logs_events_while_active() {
        let bus = EventBus::new();
        let registry = registry(&bus);
        let plugin = Arc::new(EventLoggerPlugin::new());

        let info = registry.register_plugin(plugin.clone(), RegisterOptions::default()).await.unwrap();
        assert_eq!(info.status, PluginStatus::Active);
        assert_eq!(plugin.events_logged(), 1, "plugin.registered is the first event seen");

        bus.publish(EventDraft::new("quote.updated", "test")).await.unwrap();
        assert_eq!(plugin.events_logged(), 2);
        assert_eq!(plugin.status().details["subscribed"], json!(true));

        registry.unload_plugin(PLUGIN_ID).await.unwrap();
        let before = plugin.events_logged();
        bus.publish(EventDraft::new("quote.updated", "test")).await.unwrap();
        assert_eq!(plugin.events_logged(), before, "No logging after unload");
    }

    #[tokio::test]
    async fn test_excluded_prefixes_are_skipped() {
        let bus = EventBus::new();
        let registry = registry(&bus);
        let plugin = Arc::new(EventLoggerPlugin::new());
        registry
            .register_plugin(
                plugin.clone(),
                RegisterOptions::default().with_config(json!({ "level": "info", "exclude": ["plugin.", "tick"] })),
            )
            .await
            .unwrap();

        bus.publish(EventDraft::new("tick", "clock")).await.unwrap();
        bus.publish(EventDraft::new("report.generated", "writer")).await.unwrap();

        assert_eq!(plugin.events_logged(), 1);
    }

    #[tokio::test]
    async fn test_rejects_unknown_level() {
        let bus = EventBus::new();
        let registry = registry(&bus);
        let result = registry
            .register_plugin(
                Arc::new(EventLoggerPlugin::new()),
                RegisterOptions::default().with_config(json!({ "level": "loud" })),
            )
            .await;

        assert!(result.is_err());
        assert!(registry.plugin(PLUGIN_ID).is_none(), "Invalid config never reaches init");
    }
}
