//! Narrow interfaces through which the core consumes plugin functionality.
//!
//! A plugin advertises a capability by overriding the matching `as_*`
//! accessor on [`Plugin`](crate::plugin_system::Plugin). Callers never
//! downcast plugin instances.
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kernel::error::Result;

/// Latest price snapshot for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// One OHLC bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// One observation of an economic series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn supported_symbols(&self) -> Vec<String>;

    async fn quote(&self, symbol: &str) -> Result<Quote>;

    /// Most recent bars, oldest first
    async fn price_history(&self, symbol: &str, limit: usize) -> Result<Vec<PricePoint>>;
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn headlines(&self, query: &str, limit: usize) -> Result<Vec<NewsArticle>>;
}

#[async_trait]
pub trait EconomicDataSource: Send + Sync {
    async fn series(&self, series_id: &str) -> Result<Vec<Observation>>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str, max_tokens: Option<u32>) -> Result<String>;
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, input: &Value) -> Result<Value>;
}

#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Output format name, e.g. `markdown`
    fn format(&self) -> &str;

    async fn render(&self, report: &Value) -> Result<Vec<u8>>;
}
