//! # Stratum Core Plugin System Errors
//!
//! Defines [`PluginSystemError`], covering manifest and configuration
//! validation, dependency checks, loader failures and errors raised by the
//! plugin callbacks themselves.
use crate::kernel::error::Error;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Plugin '{plugin_id}' is already being registered")]
    AlreadyRegistered { plugin_id: String },

    #[error("Plugin '{plugin_id}' requires '{dependency}', which is not active")]
    MissingDependency { plugin_id: String, dependency: String },

    #[error("Plugin initialization error for '{plugin_id}': {message}")]
    InitializationError {
        plugin_id: String,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("Invalid manifest for '{plugin_id}': {message}")]
    InvalidManifest { plugin_id: String, message: String },

    #[error("Invalid configuration for '{plugin_id}': {message}")]
    InvalidConfig { plugin_id: String, message: String },

    #[error("Plugin not found: {plugin_id}")]
    PluginNotFound { plugin_id: String },

    #[error("No plugin loader configured; cannot load '{plugin_id}'")]
    LoaderUnavailable { plugin_id: String },

    #[error("Plugin loading failed for '{plugin_id}' (entry point '{entry_point}'): {message}")]
    LoadingError {
        plugin_id: String,
        entry_point: String,
        message: String,
    },

    #[error("Plugin cleanup failed for '{plugin_id}': {source}")]
    CleanupError {
        plugin_id: String,
        #[source]
        source: Box<Error>,
    },
}
