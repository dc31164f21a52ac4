//! Example data-provider plugin serving quotes from its configuration.
//!
//! ```toml
//! [plugins.static-market-data.quotes.AAPL]
//! price = 190.25
//! change = 1.5
//! volume = 52000000
//! ```
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{Days, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use stratum_core::plugin_system::capability::{MarketDataSource, PricePoint, Quote};
use stratum_core::plugin_system::{ManifestBuilder, Plugin, PluginCategory, PluginContext, PluginHealth, PluginManifest};
use stratum_core::{Error, Result};

pub const PLUGIN_ID: &str = "static-market-data";

/// Event published once the quotes are loaded
pub const READY_EVENT: &str = "market-data.ready";

/// Ten years of daily bars
pub const MAX_HISTORY_DAYS: usize = 3650;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StaticQuote {
    pub price: f64,
    /// Change against the previous close
    #[serde(default)]
    pub change: f64,
    #[serde(default)]
    pub volume: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct MarketConfig {
    #[serde(default)]
    quotes: BTreeMap<String, StaticQuote>,
}

impl MarketConfig {
    fn parse(config: &Value) -> Result<Self> {
        if config.is_null() {
            return Ok(Self::default());
        }
        let parsed: MarketConfig =
            serde_json::from_value(config.clone()).map_err(|e| Error::from(format!("invalid quotes: {}", e)))?;
        if let Some((symbol, _)) = parsed.quotes.iter().find(|(_, q)| !(q.price > 0.0)) {
            return Err(Error::from(format!("price for {} must be positive", symbol)));
        }
        Ok(parsed)
    }
}

pub struct StaticMarketDataPlugin {
    manifest: PluginManifest,
    quotes: Mutex<BTreeMap<String, StaticQuote>>,
}

impl Default for StaticMarketDataPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticMarketDataPlugin {
    pub fn new() -> Self {
        let manifest = ManifestBuilder::new(PLUGIN_ID, "Static Market Data", env!("CARGO_PKG_VERSION"))
            .description("Quotes and price history from configuration, for demos and offline use")
            .author("Stratum")
            .category(PluginCategory::DataProvider)
            .permission("config:read")
            .tags(&["quotes", "offline"])
            .config_schema(json!({
                "type": "object",
                "properties": {
                    "quotes": {
                        "type": "object",
                        "additionalProperties": {
                            "type": "object",
                            "required": ["price"],
                            "properties": {
                                "price": { "type": "number", "exclusiveMinimum": 0 },
                                "change": { "type": "number" },
                                "volume": { "type": "integer" }
                            }
                        }
                    }
                }
            }))
            .build();
        Self { manifest, quotes: Mutex::new(BTreeMap::new()) }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, StaticQuote>> {
        self.quotes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, symbol: &str) -> Result<StaticQuote> {
        let key = symbol.to_ascii_uppercase();
        self.lock()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::from(format!("{} has no quote for '{}'", PLUGIN_ID, symbol)))
    }
}

#[async_trait]
impl Plugin for StaticMarketDataPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        MarketConfig::parse(config).map(|_| ())
    }

    async fn init(&self, context: PluginContext, config: Value) -> Result<()> {
        let parsed = MarketConfig::parse(&config)?;
        let symbols: Vec<String> = parsed.quotes.keys().map(|s| s.to_ascii_uppercase()).collect();
        *self.lock() = parsed
            .quotes
            .into_iter()
            .map(|(symbol, quote)| (symbol.to_ascii_uppercase(), quote))
            .collect();
        log::info!("{} serving {} symbol(s)", PLUGIN_ID, symbols.len());
        context.publish(READY_EVENT, json!({ "symbols": symbols })).await?;
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        self.lock().clear();
        Ok(())
    }

    fn status(&self) -> PluginHealth {
        let symbols = self.lock().len();
        if symbols == 0 {
            PluginHealth::unhealthy("no quotes configured").with_details(json!({ "symbols": 0 }))
        } else {
            PluginHealth::healthy().with_details(json!({ "symbols": symbols }))
        }
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["quotes".to_string(), "price-history".to_string()]
    }

    fn as_market_data_source(&self) -> Option<&dyn MarketDataSource> {
        Some(self)
    }
}

#[async_trait]
impl MarketDataSource for StaticMarketDataPlugin {
    fn supported_symbols(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let quote = self.lookup(symbol)?;
        let previous = quote.price - quote.change;
        let change_percent = if previous != 0.0 { quote.change / previous * 100.0 } else { 0.0 };
        Ok(Quote {
            symbol: symbol.to_ascii_uppercase(),
            price: quote.price,
            change: quote.change,
            change_percent,
            volume: quote.volume,
            timestamp: Utc::now(),
        })
    }

    /// A straight line ending at the configured price, one bar per day.
    /// At most [`MAX_HISTORY_DAYS`] bars are returned.
    async fn price_history(&self, symbol: &str, limit: usize) -> Result<Vec<PricePoint>> {
        let quote = self.lookup(symbol)?;
        let today = Utc::now().date_naive();
        let days = limit.min(MAX_HISTORY_DAYS);
        let mut bars = Vec::with_capacity(days);
        for days_ago in (0..days).rev() {
            let date = today
                .checked_sub_days(Days::new(days_ago as u64))
                .ok_or_else(|| Error::from(format!("history for {} reaches before the earliest date", symbol)))?;
            let close = (quote.price - quote.change * days_ago as f64).max(0.01);
            let open = (close - quote.change).max(0.01);
            bars.push(PricePoint {
                date,
                open,
                high: open.max(close),
                low: open.min(close),
                close,
                volume: quote.volume.unwrap_or(0),
            });
        }
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use stratum_core::plugin_system::{PluginPaths, PluginRegistry, PluginStatus, PluginSystemError, RegisterOptions};
    use stratum_core::{ConfigManager, EventBus, ServiceContainer};

    fn registry(bus: &EventBus, config: &ConfigManager) -> PluginRegistry {
        PluginRegistry::new(
            bus.clone(),
            ServiceContainer::new(),
            config.clone(),
            PluginPaths::new("/tmp/plugins", "/tmp/data", "/tmp/cache"),
        )
    }

    #[tokio::test]
    async fn test_serves_quotes_from_config_manager() {
        let bus = EventBus::new();
        let config = ConfigManager::new();
        config
            .set("plugins.static-market-data.quotes", json!({ "aapl": { "price": 101.0, "change": 1.0, "volume": 10 } }))
            .await
            .unwrap();
        let registry = registry(&bus, &config);
        let plugin = Arc::new(StaticMarketDataPlugin::new());

        let info = registry.register_plugin(plugin.clone(), RegisterOptions::default()).await.unwrap();
        assert_eq!(info.status, PluginStatus::Active);
        assert!(plugin.is_healthy());

        let source = plugin.as_market_data_source().unwrap();
        assert_eq!(source.supported_symbols(), vec!["AAPL".to_string()]);
        let quote = source.quote("aapl").await.unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.volume, Some(10));
        assert!((quote.change_percent - 1.0).abs() < 1e-9);

        let history = source.price_history("AAPL", 5).await.unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history.last().unwrap().close, 101.0);
        assert!(history.windows(2).all(|w| w[0].date < w[1].date));

        let ready: Vec<_> = bus.history(None).into_iter().filter(|e| e.event_type == READY_EVENT).collect();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].source, PLUGIN_ID);
        assert_eq!(ready[0].data["symbols"], json!(["AAPL"]));
    }

    #[tokio::test]
    async fn test_unknown_symbol_and_empty_config() {
        let bus = EventBus::new();
        let config = ConfigManager::new();
        let registry = registry(&bus, &config);
        let plugin = Arc::new(StaticMarketDataPlugin::new());
        registry.register_plugin(plugin.clone(), RegisterOptions::default()).await.unwrap();

        assert!(!plugin.is_healthy());
        assert!(plugin.quote("MSFT").await.is_err());
    }

    #[tokio::test]
    async fn test_price_history_is_capped() {
        let bus = EventBus::new();
        let config = ConfigManager::new();
        config
            .set("plugins.static-market-data.quotes", json!({ "SPY": { "price": 500.0, "change": 0.5 } }))
            .await
            .unwrap();
        let registry = registry(&bus, &config);
        let plugin = Arc::new(StaticMarketDataPlugin::new());
        registry.register_plugin(plugin.clone(), RegisterOptions::default()).await.unwrap();

        let history = plugin.price_history("SPY", usize::MAX).await.unwrap();

        assert_eq!(history.len(), MAX_HISTORY_DAYS);
        assert_eq!(history.last().unwrap().date, Utc::now().date_naive());
        assert!(plugin.price_history("SPY", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_non_positive_prices() {
        let bus = EventBus::new();
        let config = ConfigManager::new();
        let registry = registry(&bus, &config);

        let result = registry
            .register_plugin(
                Arc::new(StaticMarketDataPlugin::new()),
                RegisterOptions::default().with_config(json!({ "quotes": { "BAD": { "price": 0.0 } } })),
            )
            .await;

        assert!(matches!(result, Err(Error::PluginSystem(PluginSystemError::InvalidConfig { .. }))));
    }
}
