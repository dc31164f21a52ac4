#![cfg(test)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde_json::Value;

use crate::kernel::error::{Error, Result};
use crate::kernel::{Kernel, KernelOptions};
use crate::plugin_system::capability::{MarketDataSource, PricePoint, Quote};
use crate::plugin_system::{ManifestBuilder, Plugin, PluginCategory, PluginContext, PluginManifest, PluginPaths};

// ===== SHARED TRACE =====

pub type Trace = Arc<Mutex<Vec<String>>>;

pub fn trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(trace: &Trace) -> Vec<String> {
    trace.lock().unwrap().clone()
}

pub async fn test_kernel() -> Kernel {
    let options = KernelOptions::default()
        .without_environment()
        .with_plugin_paths(PluginPaths::new("/tmp/stratum/plugins", "/tmp/stratum/data", "/tmp/stratum/cache"));
    Kernel::new(options).await.expect("kernel construction failed")
}

// ===== MOCK PLUGINS =====

/// Data provider serving fixed prices from its `prices` configuration.
///
/// Registers the symbol list as the `<id>.symbols` service during `init`.
pub struct QuotePlugin {
    manifest: PluginManifest,
    trace: Trace,
    prices: Mutex<BTreeMap<String, f64>>,
    context: Mutex<Option<PluginContext>>,
}

impl QuotePlugin {
    pub fn new(id: &str, trace: &Trace) -> Self {
        let manifest = ManifestBuilder::new(id, "Quote Provider", "1.0.0")
            .category(PluginCategory::DataProvider)
            .tags(&["quotes"])
            .build();
        Self {
            manifest,
            trace: Arc::clone(trace),
            prices: Mutex::new(BTreeMap::new()),
            context: Mutex::new(None),
        }
    }

    fn record(&self, callback: &str) {
        self.trace.lock().unwrap().push(format!("{}:{}", self.manifest.id, callback));
    }

    fn price(&self, symbol: &str) -> Result<f64> {
        self.prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::from(format!("Unknown symbol {}", symbol)))
    }
}

#[async_trait]
impl Plugin for QuotePlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    async fn init(&self, context: PluginContext, config: Value) -> Result<()> {
        self.record("init");
        let prices: BTreeMap<String, f64> = match config.get("prices") {
            Some(prices) => serde_json::from_value(prices.clone()).map_err(|e| Error::from(e.to_string()))?,
            None => BTreeMap::new(),
        };
        let symbols: Vec<String> = prices.keys().cloned().collect();
        *self.prices.lock().unwrap() = prices;
        context
            .services
            .register_instance(&format!("{}.symbols", self.manifest.id), symbols)
            .await?;
        *self.context.lock().unwrap() = Some(context);
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.record("start");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop");
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        self.record("cleanup");
        let context = self.context.lock().unwrap().take();
        if let Some(context) = context {
            context.services.unregister(&format!("{}.symbols", self.manifest.id)).await?;
        }
        Ok(())
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["quotes".to_string(), "price-history".to_string()]
    }

    fn as_market_data_source(&self) -> Option<&dyn MarketDataSource> {
        Some(self)
    }
}

#[async_trait]
impl MarketDataSource for QuotePlugin {
    fn supported_symbols(&self) -> Vec<String> {
        self.prices.lock().unwrap().keys().cloned().collect()
    }

    async fn quote(&self, symbol: &str) -> Result<Quote> {
        let price = self.price(symbol)?;
        Ok(Quote {
            symbol: symbol.to_string(),
            price,
            change: 0.0,
            change_percent: 0.0,
            volume: None,
            timestamp: Utc::now(),
        })
    }

    async fn price_history(&self, symbol: &str, limit: usize) -> Result<Vec<PricePoint>> {
        let price = self.price(symbol)?;
        let today = NaiveDate::from_ymd_opt(2024, 1, 31).ok_or("bad date")?;
        Ok((0..limit)
            .rev()
            .map(|days_ago| PricePoint {
                date: today - Duration::days(days_ago as i64),
                open: price,
                high: price,
                low: price,
                close: price,
                volume: 0,
            })
            .collect())
    }
}

/// Analytics plugin that depends on a quote provider and reads its symbols
/// service when started.
pub struct ScreenerPlugin {
    manifest: PluginManifest,
    provider: String,
    trace: Trace,
    context: Mutex<Option<PluginContext>>,
    pub symbols_seen: Mutex<Vec<String>>,
}

impl ScreenerPlugin {
    pub fn new(id: &str, provider: &str, trace: &Trace) -> Self {
        let manifest = ManifestBuilder::new(id, "Screener", "0.3.0")
            .category(PluginCategory::Analytics)
            .dependency(provider)
            .build();
        Self {
            manifest,
            provider: provider.to_string(),
            trace: Arc::clone(trace),
            context: Mutex::new(None),
            symbols_seen: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, callback: &str) {
        self.trace.lock().unwrap().push(format!("{}:{}", self.manifest.id, callback));
    }
}

#[async_trait]
impl Plugin for ScreenerPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    async fn init(&self, context: PluginContext, _config: Value) -> Result<()> {
        self.record("init");
        *self.context.lock().unwrap() = Some(context);
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.record("start");
        let context = self.context.lock().unwrap().clone().ok_or("not initialized")?;
        let symbols = context
            .services
            .resolve::<Vec<String>>(&format!("{}.symbols", self.provider))
            .await?;
        *self.symbols_seen.lock().unwrap() = symbols.as_ref().clone();
        context
            .publish("screener.ready", serde_json::json!({ "symbols": symbols.len() }))
            .await?;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop");
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        self.record("cleanup");
        self.context.lock().unwrap().take();
        Ok(())
    }
}
