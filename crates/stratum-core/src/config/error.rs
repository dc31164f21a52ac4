//! # Stratum Core Configuration Errors
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading configuration '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported configuration format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization to '{format}' failed: {message}")]
    Serialization { format: String, message: String },

    #[error("Deserialization from '{format}' failed: {message}")]
    Deserialization { format: String, message: String },
}
