//! # Stratum Core Service Container Errors
//!
//! Defines [`ServiceError`], raised by registration, resolution and removal
//! of services in the [`ServiceContainer`](crate::service::ServiceContainer).
use crate::kernel::error::Error;
use crate::utils::format_path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service '{id}' is already registered")]
    DuplicateService { id: String },

    #[error("Service '{id}' is not registered")]
    ServiceNotFound { id: String },

    #[error("Circular dependency detected while resolving '{id}': {}", format_path(.path))]
    CircularDependency { id: String, path: Vec<String> },

    #[error("Service '{id}' cannot be unregistered; required by: {}", .dependents.join(", "))]
    HasDependents { id: String, dependents: Vec<String> },

    #[error("Service '{id}' is not of the requested type '{expected}'")]
    TypeMismatch { id: String, expected: &'static str },

    #[error("Factory for service '{id}' failed: {source}")]
    FactoryFailed {
        id: String,
        #[source]
        source: Box<Error>,
    },
}
