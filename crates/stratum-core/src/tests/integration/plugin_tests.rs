#![cfg(test)]

use std::sync::Arc;

use serde_json::json;

use super::common::{entries, test_kernel, trace, QuotePlugin, ScreenerPlugin};
use crate::kernel::error::Error;
use crate::plugin_system::{PluginCategory, PluginStatus, PluginSystemError, RegisterOptions};

#[tokio::test]
async fn test_dependent_plugins_register_in_order_and_share_services() {
    let kernel = test_kernel().await;
    let t = trace();
    kernel
        .set_config("plugins.quotes.prices", json!({ "AAPL": 190.5, "MSFT": 410.0 }))
        .await
        .unwrap();

    let quotes = kernel
        .register_plugin(Arc::new(QuotePlugin::new("quotes", &t)), RegisterOptions::default())
        .await
        .expect("quotes failed");
    let screener = Arc::new(ScreenerPlugin::new("screener", "quotes", &t));
    let info = kernel
        .register_plugin(screener.clone(), RegisterOptions::default())
        .await
        .expect("screener failed");

    assert_eq!(quotes.status, PluginStatus::Active);
    assert_eq!(info.status, PluginStatus::Active);
    assert_eq!(entries(&t), vec!["quotes:init", "quotes:start", "screener:init", "screener:start"]);
    assert_eq!(*screener.symbols_seen.lock().unwrap(), vec!["AAPL".to_string(), "MSFT".to_string()]);
    assert_eq!(kernel.plugins_by_category(PluginCategory::Analytics).len(), 1);
}

#[tokio::test]
async fn test_unloading_a_dependency_is_not_blocked() {
    let kernel = test_kernel().await;
    let t = trace();
    kernel
        .register_plugin(Arc::new(QuotePlugin::new("quotes", &t)), RegisterOptions::default())
        .await
        .unwrap();
    kernel
        .register_plugin(Arc::new(ScreenerPlugin::new("screener", "quotes", &t)), RegisterOptions::default())
        .await
        .unwrap();

    let unloaded = kernel.unload_plugin("quotes").await.expect("unload failed");

    assert!(unloaded);
    assert_eq!(kernel.registry().plugin("quotes").unwrap().status, PluginStatus::Unloaded);
    assert!(kernel.registry().is_active("screener"), "Dependents stay active");
    assert!(!kernel.services().is_registered("quotes.symbols"), "Cleanup removed the provider's service");
}

#[tokio::test]
async fn test_missing_dependency_then_retry_succeeds() {
    let kernel = test_kernel().await;
    let t = trace();

    let result = kernel
        .register_plugin(Arc::new(ScreenerPlugin::new("screener", "quotes", &t)), RegisterOptions::default())
        .await;
    assert!(matches!(
        result,
        Err(Error::PluginSystem(PluginSystemError::MissingDependency { ref dependency, .. })) if dependency == "quotes"
    ));
    assert!(!kernel.registry().is_active("screener"));
    assert!(entries(&t).is_empty(), "No callback runs when a dependency is missing");

    kernel
        .register_plugin(Arc::new(QuotePlugin::new("quotes", &t)), RegisterOptions::default())
        .await
        .unwrap();
    let info = kernel
        .register_plugin(Arc::new(ScreenerPlugin::new("screener", "quotes", &t)), RegisterOptions::default())
        .await
        .expect("retry failed");
    assert_eq!(info.status, PluginStatus::Active);
}

#[tokio::test]
async fn test_capabilities_are_consumed_through_the_registry() {
    let kernel = test_kernel().await;
    let t = trace();
    kernel
        .register_plugin(
            Arc::new(QuotePlugin::new("quotes", &t)),
            RegisterOptions::default().with_config(json!({ "prices": { "SPY": 500.0 } })),
        )
        .await
        .unwrap();

    let instance = kernel.registry().instance("quotes").expect("instance missing");
    assert!(instance.as_news_source().is_none());
    let source = instance.as_market_data_source().expect("quotes should be a market data source");

    assert_eq!(source.supported_symbols(), vec!["SPY".to_string()]);
    let quote = source.quote("SPY").await.expect("quote failed");
    assert_eq!(quote.price, 500.0);
    let history = source.price_history("SPY", 3).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history[0].date < history[2].date, "History is oldest first");
    assert!(source.quote("QQQ").await.is_err());
}

#[tokio::test]
async fn test_kernel_stop_stops_plugins_in_reverse_order() {
    let kernel = test_kernel().await;
    let t = trace();
    kernel.start().await.unwrap();
    kernel
        .register_plugin(Arc::new(QuotePlugin::new("quotes", &t)), RegisterOptions::default())
        .await
        .unwrap();
    kernel
        .register_plugin(Arc::new(ScreenerPlugin::new("screener", "quotes", &t)), RegisterOptions::default())
        .await
        .unwrap();
    t.lock().unwrap().clear();

    kernel.stop().await.expect("stop failed");

    assert_eq!(entries(&t), vec!["screener:stop", "quotes:stop"]);
    assert!(kernel.plugins().iter().all(|p| p.status == PluginStatus::Disabled));
    assert_eq!(kernel.status().plugins.active, 0);
}

#[tokio::test]
async fn test_kernel_restart_resumes_stopped_plugins_in_registration_order() {
    let kernel = test_kernel().await;
    let t = trace();
    kernel.start().await.unwrap();
    kernel
        .register_plugin(Arc::new(QuotePlugin::new("quotes", &t)), RegisterOptions::default())
        .await
        .unwrap();
    kernel
        .register_plugin(Arc::new(ScreenerPlugin::new("screener", "quotes", &t)), RegisterOptions::default())
        .await
        .unwrap();
    kernel.stop().await.expect("stop failed");
    t.lock().unwrap().clear();

    kernel.start().await.expect("restart failed");

    assert_eq!(entries(&t), vec!["quotes:start", "screener:start"], "No second init on restart");
    assert!(kernel.plugins().iter().all(|p| p.status == PluginStatus::Active));
    assert_eq!(kernel.status().plugins.active, 2);
}
