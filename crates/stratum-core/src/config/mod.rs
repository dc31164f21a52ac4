//! # Stratum Core Configuration
//!
//! Layered key/value configuration. A [`ConfigManager`] holds prioritized
//! [`ConfigSource`]s (environment, files, built-in defaults) plus runtime
//! overrides, and hands each plugin the slice of keys under
//! `plugins.<plugin id>.`.
//!
//! JSON is always supported; YAML and TOML files require the `yaml-config`
//! and `toml-config` features.
pub mod data;
pub mod error;
pub mod manager;
pub mod source;

pub use data::{ConfigData, ConfigFormat};
pub use error::ConfigError;
pub use manager::{ConfigManager, ConfigStatistics};
pub use source::{ConfigSource, DEFAULTS_PRIORITY, ENVIRONMENT_PRIORITY};
