//! # Stratum Core Lifecycle Errors
use crate::kernel::error::Error;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{component} is already running")]
    AlreadyRunning { component: String },

    #[error("{component} is not running")]
    NotRunning { component: String },

    #[error("Lifecycle phase not found: {phase}")]
    PhaseNotFound { phase: String },

    #[error("Hook '{hook_id}' failed in phase '{phase}': {source}")]
    HookFailed {
        hook_id: String,
        phase: String,
        #[source]
        source: Box<Error>,
    },
}
