//! # Stratum Core
//!
//! In-process extensibility core: an [`EventBus`], a dependency-injection
//! [`ServiceContainer`], a [`PluginRegistry`] and a [`LifecycleManager`],
//! composed by the [`Kernel`] facade.
pub mod config;
pub mod event;
pub mod kernel;
pub mod lifecycle;
pub mod plugin_system;
pub mod service;
pub mod utils;

// Re-export key public types for the binary and plugin crates
pub use config::ConfigManager;
pub use event::{Event, EventBus, EventDraft, EventHandler};
pub use kernel::error::{Error, Result};
pub use kernel::{Kernel, KernelOptions, KernelStatus};
pub use lifecycle::{HookSpec, LifecycleManager, LifecyclePhase};
pub use plugin_system::{Plugin, PluginContext, PluginManifest, PluginRegistry};
pub use service::ServiceContainer;

// Crate-level test support and integration scenarios
#[cfg(test)]
mod tests;
