//! # Stratum Core Lifecycle Manager
//!
//! Ordered startup and shutdown. A [`LifecycleManager`] runs named
//! [`LifecyclePhase`]s by ascending `order` on start and descending on stop;
//! inside a phase, hooks run by descending priority (reversed on stop).
//!
//! A failing hook is reported and the phase carries on, except in the phase
//! named [`CRITICAL_PHASE`], where the first failure aborts the run.
pub mod error;
pub mod manager;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::kernel::error::Result;
use crate::utils::BoxFuture;

/// Name of the one phase whose hook failures are fatal
pub const CRITICAL_PHASE: &str = "critical";

/// Zero-argument asynchronous hook body
pub type HookHandler = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecyclePhase {
    pub name: String,
    pub order: i32,
    pub description: String,
    /// Informational only; execution follows `order`
    pub dependencies: Vec<String>,
}

impl LifecyclePhase {
    pub fn new(name: &str, order: i32, description: &str) -> Self {
        Self {
            name: name.to_string(),
            order,
            description: description.to_string(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        self
    }
}

/// The phases every manager starts with
pub fn default_phases() -> Vec<LifecyclePhase> {
    vec![
        LifecyclePhase::new("pre-init", 0, "Prepare the environment"),
        LifecyclePhase::new("config", 1, "Load configuration").with_dependencies(&["pre-init"]),
        LifecyclePhase::new("services", 2, "Register and validate services").with_dependencies(&["config"]),
        LifecyclePhase::new("plugins", 3, "Register and start plugins").with_dependencies(&["services"]),
        LifecyclePhase::new("post-init", 4, "Finish initialization").with_dependencies(&["plugins"]),
        LifecyclePhase::new("ready", 5, "System ready").with_dependencies(&["post-init"]),
    ]
}

/// Which run a hook takes part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HookDirection {
    Startup,
    Shutdown,
    #[default]
    Both,
}

impl HookDirection {
    pub fn applies(self, reverse: bool) -> bool {
        match self {
            HookDirection::Startup => !reverse,
            HookDirection::Shutdown => reverse,
            HookDirection::Both => true,
        }
    }
}

/// Everything needed to register a hook
#[derive(Clone)]
pub struct HookSpec {
    /// Generated when `None`; a known id replaces the existing hook
    pub id: Option<String>,
    pub phase: String,
    pub plugin_id: Option<String>,
    pub handler: HookHandler,
    pub priority: i32,
    pub enabled: bool,
    pub direction: HookDirection,
}

impl HookSpec {
    pub fn new<F, Fut>(phase: &str, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler: HookHandler = Arc::new(move || -> BoxFuture<'static, Result<()>> { Box::pin(handler()) });
        Self {
            id: None,
            phase: phase.to_string(),
            plugin_id: None,
            handler,
            priority: 0,
            enabled: true,
            direction: HookDirection::Both,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn for_plugin(mut self, plugin_id: &str) -> Self {
        self.plugin_id = Some(plugin_id.to_string());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn direction(mut self, direction: HookDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Hook snapshot without its handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookInfo {
    pub id: String,
    pub phase: String,
    pub plugin_id: Option<String>,
    pub priority: i32,
    pub enabled: bool,
    pub direction: HookDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseState {
    Pending,
    Running,
    Completed,
    Error,
}

/// Outcome of the latest run of one phase
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseStatus {
    pub name: String,
    pub state: PhaseState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub hooks_run: usize,
    pub hooks_failed: usize,
    pub error: Option<String>,
}

impl PhaseStatus {
    fn pending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: PhaseState::Pending,
            started_at: None,
            completed_at: None,
            hooks_run: 0,
            hooks_failed: 0,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleStatus {
    pub state: RunState,
    pub current_phase: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    /// In execution order
    pub phases: Vec<PhaseStatus>,
}

/// Counts reported in the kernel status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleStatistics {
    pub phases: usize,
    pub hooks: usize,
    pub enabled_hooks: usize,
    pub completed_phases: usize,
    pub failed_phases: usize,
    pub hook_failures: u64,
}

/// Re-export important types
pub use error::LifecycleError;
pub use manager::LifecycleManager;

// Test module declaration
#[cfg(test)]
mod tests;
