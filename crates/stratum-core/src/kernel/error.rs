//! # Stratum Core Kernel Errors
//!
//! Defines the crate-wide [`Error`] type and the `Result` alias.
//!
//! Every subsystem keeps its own typed error enum ([`EventSystemError`],
//! [`ServiceError`], [`PluginSystemError`], [`LifecycleError`],
//! [`ConfigError`]); they all convert into [`Error`] through `#[from]`, so
//! callers of the [`Kernel`](crate::kernel::Kernel) facade only deal with a
//! single error type and can still match on the subsystem variant.
use std::result::Result as StdResult;

use crate::config::error::ConfigError;
use crate::event::error::EventSystemError;
use crate::lifecycle::error::LifecycleError;
use crate::plugin_system::error::PluginSystemError;
use crate::service::error::ServiceError;
use thiserror::Error as ThisError;

/// Crate-wide error type
#[derive(Debug, ThisError)]
pub enum Error {
    /// Event bus error
    #[error("Event system error: {0}")]
    EventSystem(#[from] EventSystemError),

    /// Service container error
    #[error("Service container error: {0}")]
    Service(#[from] ServiceError),

    /// Plugin registry or loader error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Lifecycle manager or kernel state error
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

