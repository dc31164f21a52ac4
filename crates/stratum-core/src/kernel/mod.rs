//! # Stratum Core Kernel
//!
//! The `kernel` module composes the core components into a single facade.
//!
//! - **Bootstrapping**: [`Kernel`](bootstrap::Kernel) builds (or accepts) the
//!   event bus, service container, configuration, plugin registry and
//!   lifecycle manager, wires them together and registers each one as a
//!   service.
//! - **Constants**: names, default directories and service ids in `constants`.
//! - **Error Handling**: the crate-wide [`Error`](error::Error) and `Result`
//!   alias in `error`.
pub mod bootstrap;
pub mod constants;
pub mod error;

pub use bootstrap::{Kernel, KernelHandle, KernelOptions, KernelStatus};
pub use error::{Error, Result};
