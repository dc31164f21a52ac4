#![cfg(test)]

use std::sync::{Arc, Mutex};

use serde_json::json;

use super::common::{test_kernel, trace, QuotePlugin, ScreenerPlugin};
use crate::event::{handler_fn, sync_handler, Event};
use crate::kernel::bootstrap::ALL_EVENTS;
use crate::kernel::error::Error;
use crate::kernel::{Kernel, KernelOptions};
use crate::plugin_system::RegisterOptions;

#[tokio::test]
async fn test_plugin_events_reach_kernel_subscribers() {
    let kernel = test_kernel().await;
    let t = trace();
    let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    kernel.subscribe_to_events(
        "screener.ready",
        sync_handler(move |event: &Event| {
            seen_clone.lock().unwrap().push((event.source.clone(), event.data["symbols"].to_string()));
            Ok(())
        }),
        0,
    );

    kernel
        .register_plugin(
            Arc::new(QuotePlugin::new("quotes", &t)),
            RegisterOptions::default().with_config(json!({ "prices": { "A": 1.0, "B": 2.0 } })),
        )
        .await
        .unwrap();
    kernel
        .register_plugin(Arc::new(ScreenerPlugin::new("screener", "quotes", &t)), RegisterOptions::default())
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![("screener".to_string(), "2".to_string())]);
}

#[tokio::test]
async fn test_wildcard_subscription_sees_plugin_lifecycle() {
    let kernel = test_kernel().await;
    let t = trace();
    let types: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let types_clone = Arc::clone(&types);
    kernel.subscribe_to_events(
        ALL_EVENTS,
        handler_fn(move |event: Arc<Event>| {
            let types = Arc::clone(&types_clone);
            async move {
                types.lock().unwrap().push(event.event_type.clone());
                Ok::<(), Error>(())
            }
        }),
        0,
    );

    kernel
        .register_plugin(Arc::new(QuotePlugin::new("quotes", &t)), RegisterOptions::default())
        .await
        .unwrap();

    let types = types.lock().unwrap().clone();
    assert_eq!(types.first().map(String::as_str), Some("plugin.registering"));
    assert!(types.contains(&"service.registered".to_string()), "Services registered during init are announced");
    assert_eq!(types.last().map(String::as_str), Some("plugin.registered"));
}

#[tokio::test]
async fn test_history_is_bounded_by_kernel_options() {
    let options = KernelOptions { max_history_size: 5, ..KernelOptions::default().without_environment() };
    let kernel = Kernel::new(options).await.unwrap();

    for i in 0..20 {
        kernel.publish_event("tick", json!({ "n": i })).await.unwrap();
    }

    let history = kernel.events().history(None);
    assert_eq!(history.len(), 5);
    let numbers: Vec<i64> = history.iter().map(|e| e.data["n"].as_i64().unwrap()).collect();
    assert_eq!(numbers, vec![15, 16, 17, 18, 19]);
    assert_eq!(kernel.status().event_history, 5);
}
