//! Text and JSON rendering for the command-line interface.
use serde_json::{json, Value};
use stratum_core::kernel::KernelStatus;
use stratum_core::plugin_system::PluginInfo;
use stratum_core::service::ServiceDescriptor;
use stratum_core::Event;

pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Failed to render JSON: {}", e),
    }
}

pub fn status_lines(status: &KernelStatus) -> Vec<String> {
    let uptime = status.uptime_ms.map_or_else(|| "-".to_string(), |ms| format!("{}ms", ms));
    vec![
        format!("{} v{}", status.name, status.version),
        format!("Running:    {} (uptime {})", if status.running { "yes" } else { "no" }, uptime),
        format!(
            "Plugins:    {} active / {} total ({} errors)",
            status.plugins.active, status.plugins.total, status.plugins.total_errors
        ),
        format!("Services:   {} registered, {} resolved", status.services.total, status.services.resolved),
        format!(
            "Config:     {} sources, {} keys, {} overrides",
            status.config.sources, status.config.keys, status.config.overrides
        ),
        format!(
            "Lifecycle:  {} phases, {} hooks ({} failures)",
            status.lifecycle.phases, status.lifecycle.hooks, status.lifecycle.hook_failures
        ),
        format!("Events:     {} in history, {} subscriptions", status.event_history, status.subscriptions),
    ]
}

pub fn plugin_json(info: &PluginInfo) -> Value {
    let health = info.instance.as_ref().map(|plugin| plugin.status());
    json!({
        "id": info.manifest.id,
        "name": info.manifest.name,
        "version": info.manifest.version,
        "category": info.manifest.category,
        "status": info.status,
        "errorCount": info.error_count,
        "lastError": info.last_error,
        "capabilities": info.instance.as_ref().map(|plugin| plugin.capabilities()).unwrap_or_default(),
        "health": health,
    })
}

pub fn plugin_line(info: &PluginInfo) -> String {
    let health = match info.instance.as_ref().map(|plugin| plugin.status()) {
        Some(health) if health.healthy => "healthy".to_string(),
        Some(health) => format!("unhealthy: {}", health.message.unwrap_or_default()),
        None => "no instance".to_string(),
    };
    format!(
        "  {:<22} {:<8} {:<14} {:<9} {}",
        info.manifest.id,
        info.manifest.version,
        info.manifest.category.as_str(),
        info.status.to_string(),
        health
    )
}

pub fn event_line(event: &Event) -> String {
    format!(
        "  {} {:<32} {:<20} {}",
        event.timestamp.format("%H:%M:%S%.3f"),
        event.event_type,
        event.source,
        event.data
    )
}

pub fn service_line(service: &ServiceDescriptor) -> String {
    let lifetime = if service.singleton { "singleton" } else { "transient" };
    let resolved = if service.resolved { "resolved" } else { "pending" };
    let dependencies = if service.dependencies.is_empty() {
        String::new()
    } else {
        format!(" <- {}", service.dependencies.join(", "))
    };
    format!("  {:<20} {:<9} {:<8}{}", service.id, lifetime, resolved, dependencies)
}
