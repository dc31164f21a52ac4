//! # Stratum Core Service Container
//!
//! A registry and resolver for named services. Each service is produced by a
//! zero-argument, possibly asynchronous factory; singletons are cached after
//! their first resolution, transients are rebuilt on every call. Services may
//! declare dependencies on other service ids, which are resolved first and
//! checked for cycles.
pub mod container;
pub mod error;

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::kernel::error::Result;
use crate::utils::BoxFuture;

/// A type-erased service instance
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Zero-argument service factory
pub type ServiceFactory = Arc<dyn Fn() -> BoxFuture<'static, Result<ServiceInstance>> + Send + Sync>;

/// Registration options for a service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceOptions {
    pub singleton: bool,
    pub dependencies: Vec<String>,
    pub metadata: HashMap<String, Value>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            singleton: true,
            dependencies: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

impl ServiceOptions {
    pub fn singleton() -> Self {
        Self::default()
    }

    pub fn transient() -> Self {
        Self { singleton: false, ..Self::default() }
    }

    pub fn depends_on<S: AsRef<str>>(mut self, ids: &[S]) -> Self {
        self.dependencies.extend(ids.iter().map(|id| id.as_ref().to_string()));
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Metadata snapshot of a registered service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub id: String,
    pub singleton: bool,
    pub dependencies: Vec<String>,
    pub metadata: HashMap<String, Value>,
    pub resolved: bool,
    pub registered_at: DateTime<Utc>,
}

/// Result of a full dependency-graph validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub valid: bool,
    /// Each cycle as an ordered id list that starts and ends with the same id
    pub cycles: Vec<Vec<String>>,
}

/// Counts reported in the kernel status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ServiceStatistics {
    pub total: usize,
    pub singletons: usize,
    pub transients: usize,
    pub resolved: usize,
}

/// Re-export important types
pub use container::ServiceContainer;
pub use error::ServiceError;
