use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kernel::error::Result;
use crate::plugin_system::capability::{
    Analyzer, EconomicDataSource, MarketDataSource, NewsSource, ReportRenderer, TextGenerator,
};
use crate::plugin_system::context::PluginContext;
use crate::plugin_system::manifest::PluginManifest;

/// Registry-side state of a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    Loading,
    Active,
    Error,
    Disabled,
    Unloaded,
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginStatus::Loading => "loading",
            PluginStatus::Active => "active",
            PluginStatus::Error => "error",
            PluginStatus::Disabled => "disabled",
            PluginStatus::Unloaded => "unloaded",
        };
        f.write_str(name)
    }
}

/// Self-reported health of a plugin instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginHealth {
    pub healthy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Value,
}

impl PluginHealth {
    pub fn healthy() -> Self {
        Self { healthy: true, message: None, details: Value::Null }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self { healthy: false, message: Some(message.into()), details: Value::Null }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Core trait that all plugins must implement.
///
/// The registry is the only caller of `init`, `start`, `stop` and
/// `cleanup`. Methods take `&self`; plugins keep mutable state behind their
/// own locks.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn manifest(&self) -> &PluginManifest;

    /// Receive the context and the plugin's configuration. Called once per
    /// registration, before `start`.
    async fn init(&self, context: PluginContext, config: Value) -> Result<()>;

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    /// Release everything acquired since `init`.
    async fn cleanup(&self) -> Result<()>;

    fn status(&self) -> PluginHealth {
        PluginHealth::healthy()
    }

    fn is_healthy(&self) -> bool {
        self.status().healthy
    }

    /// Free-form capability names, e.g. `quotes`
    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    fn config_schema(&self) -> Option<Value> {
        self.manifest().config_schema.clone()
    }

    /// Reject a configuration before `init` runs.
    fn validate_config(&self, _config: &Value) -> Result<()> {
        Ok(())
    }

    fn as_market_data_source(&self) -> Option<&dyn MarketDataSource> {
        None
    }

    fn as_news_source(&self) -> Option<&dyn NewsSource> {
        None
    }

    fn as_economic_data_source(&self) -> Option<&dyn EconomicDataSource> {
        None
    }

    fn as_text_generator(&self) -> Option<&dyn TextGenerator> {
        None
    }

    fn as_analyzer(&self) -> Option<&dyn Analyzer> {
        None
    }

    fn as_report_renderer(&self) -> Option<&dyn ReportRenderer> {
        None
    }
}
