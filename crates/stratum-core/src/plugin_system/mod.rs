//! # Stratum Core Plugin System
//!
//! Registration and orchestration of independently-authored plugins.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`traits`]**: the [`Plugin`] contract every plugin implements, plus
//!   the registry-side [`PluginStatus`] and self-reported [`PluginHealth`].
//! - **[`capability`]**: narrow interfaces (market data, news, text
//!   generation, rendering) a plugin may expose through its `as_*` accessors.
//! - **[`manifest`]**: the serde-backed [`PluginManifest`] and its builder.
//! - **[`context`]**: the [`PluginContext`] handed to `init`.
//! - **[`registry`]**: the [`PluginRegistry`], which owns plugin instances
//!   and is the only component that calls their lifecycle callbacks.
//! - **[`loader`]**: the [`PluginLoader`] seam and the in-binary
//!   [`StaticPluginLoader`].
//! - **[`error`]**: [`PluginSystemError`].
pub mod capability;
pub mod context;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod traits;

pub use context::{PluginContext, PluginPaths};
pub use error::PluginSystemError;
pub use loader::{PluginConstructor, PluginLoader, StaticPluginLoader};
pub use manifest::{ManifestBuilder, PluginCategory, PluginManifest};
pub use registry::{PluginInfo, PluginRegistry, PluginStatistics, RegisterOptions};
pub use traits::{Plugin, PluginHealth, PluginStatus};

// Test module declaration
#[cfg(test)]
mod tests;
