#![cfg(test)]

use std::fs;

use serde_json::json;
use tempfile::tempdir;

use super::common::{entries, test_kernel, trace};
use crate::config::ConfigManager;
use crate::event::EventBus;
use crate::kernel::error::Error;
use crate::kernel::{Kernel, KernelOptions};
use crate::lifecycle::{HookSpec, LifecycleError, LifecyclePhase, CRITICAL_PHASE};
use crate::service::ServiceContainer;

#[tokio::test]
async fn test_kernel_start_runs_registered_hooks_between_kernel_events() {
    let kernel = test_kernel().await;
    let t = trace();
    let t_clone = t.clone();
    kernel
        .lifecycle()
        .register_hook(HookSpec::new("ready", move || {
            let t = t_clone.clone();
            async move {
                t.lock().unwrap().push("ready".to_string());
                Ok::<(), Error>(())
            }
        }))
        .await
        .unwrap();

    kernel.start().await.expect("start failed");
    kernel.stop().await.expect("stop failed");

    assert_eq!(entries(&t), vec!["ready", "ready"], "Direction Both runs on start and stop");
    let types: Vec<String> = kernel.events().history(None).iter().map(|e| e.event_type.clone()).collect();
    let started = types.iter().position(|t| t == "kernel.started").unwrap();
    let lifecycle_started = types.iter().position(|t| t == "lifecycle.started").unwrap();
    let stopped = types.iter().position(|t| t == "kernel.stopped").unwrap();
    assert!(lifecycle_started < started && started < stopped);
}

#[tokio::test]
async fn test_critical_hook_failure_keeps_kernel_stopped() {
    let kernel = test_kernel().await;
    kernel
        .lifecycle()
        .register_phase(LifecyclePhase::new(CRITICAL_PHASE, 3, "Plugins that must load"))
        .await;
    kernel
        .lifecycle()
        .register_hook(HookSpec::new(CRITICAL_PHASE, || async {
            Err::<(), Error>(Error::from("license check failed"))
        }))
        .await
        .unwrap();

    let result = kernel.start().await;

    assert!(matches!(result, Err(Error::Lifecycle(LifecycleError::HookFailed { .. }))));
    assert!(!kernel.is_running());
    assert!(!kernel.lifecycle().is_running());
    assert!(kernel.uptime().is_err());
}

#[tokio::test]
async fn test_kernel_uses_supplied_components() {
    let bus = EventBus::with_max_history_size(10);
    let services = ServiceContainer::with_event_bus(bus.clone());
    let config = ConfigManager::with_event_bus(bus.clone());
    config.set("app.mode", "paper").await.unwrap();

    let kernel = Kernel::with_components(bus.clone(), services.clone(), config, KernelOptions::default().without_environment())
        .await
        .expect("kernel construction failed");

    assert_eq!(kernel.get_config::<String>("app.mode"), Some("paper".to_string()));
    assert!(services.is_registered("pluginRegistry"));
    kernel.publish_event("app.ping", json!({})).await.unwrap();
    assert_eq!(bus.history(None).len(), 10, "The supplied bus keeps its own capacity");
    assert_eq!(bus.history(Some(1))[0].event_type, "app.ping");
}

#[tokio::test]
async fn test_kernel_reads_config_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("stratum.json");
    fs::write(
        &path,
        r#"{ "log": { "level": "debug" }, "plugins": { "quotes": { "prices": { "AAPL": 1.0 } } } }"#,
    )
    .unwrap();

    let kernel = Kernel::new(KernelOptions::default().without_environment().with_config_file(&path))
        .await
        .expect("kernel construction failed");

    assert_eq!(kernel.get_config::<String>("log.level"), Some("debug".to_string()));
    assert_eq!(kernel.get_config::<f64>("plugins.quotes.prices.AAPL"), Some(1.0));
    assert_eq!(kernel.config().plugin_config("quotes"), json!({ "prices": { "AAPL": 1.0 } }));
    assert_eq!(kernel.get_config::<usize>("history.size"), Some(1000), "Defaults still apply");
}

#[tokio::test]
async fn test_missing_config_file_fails_construction() {
    let dir = tempdir().unwrap();
    let result = Kernel::new(
        KernelOptions::default()
            .without_environment()
            .with_config_file(dir.path().join("absent.json")),
    )
    .await;

    assert!(matches!(result, Err(Error::Config(_))));
}
