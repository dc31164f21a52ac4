use std::path::Path;

use serde_json::{json, Value};

use crate::config::data::{ConfigData, ConfigFormat};
use crate::config::error::ConfigError;
use crate::kernel::constants;
use crate::kernel::error::Result;

/// Priority of the environment source seeded by the kernel
pub const ENVIRONMENT_PRIORITY: i32 = 100;
/// Priority of the built-in defaults
pub const DEFAULTS_PRIORITY: i32 = 0;

/// A named layer of configuration values; higher priority wins.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSource {
    pub name: String,
    pub priority: i32,
    pub data: ConfigData,
}

impl ConfigSource {
    pub fn new(name: impl Into<String>, priority: i32, data: ConfigData) -> Self {
        Self { name: name.into(), priority, data }
    }

    /// Values from `<PREFIX>_*` environment variables.
    ///
    /// `STRATUM_LOG_LEVEL=debug` becomes `log.level = "debug"`. Values that
    /// parse as JSON keep their type, anything else is taken as a string.
    pub fn from_env(prefix: &str) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// Same as [`ConfigSource::from_env`] over an explicit variable list.
    pub fn from_vars(prefix: &str, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let marker = format!("{}_", prefix.to_uppercase());
        let mut data = ConfigData::new();
        for (name, raw) in vars {
            let Some(stripped) = name.strip_prefix(&marker) else { continue };
            if stripped.is_empty() {
                continue;
            }
            let key = stripped.to_lowercase().replace('_', ".");
            let value = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
            data.insert(key, value);
        }
        log::debug!("Loaded {} configuration values from {}_* variables", data.len(), prefix);
        Self::new("environment", ENVIRONMENT_PRIORITY, data)
    }

    /// Built-in defaults used when nothing else sets a key.
    pub fn defaults() -> Self {
        let mut data = ConfigData::new();
        data.insert("log.level", json!("info"));
        data.insert("history.size", json!(constants::DEFAULT_HISTORY_SIZE));
        data.insert("plugins.dir", json!(constants::DEFAULT_PLUGINS_DIR));
        data.insert("data.dir", json!(constants::DEFAULT_DATA_DIR));
        data.insert("cache.dir", json!(constants::DEFAULT_CACHE_DIR));
        Self::new("defaults", DEFAULTS_PRIORITY, data)
    }

    /// Read a JSON, YAML or TOML file; the format follows the extension.
    /// Nested tables are flattened into dot-separated keys.
    pub async fn from_file(path: impl AsRef<Path>, priority: i32) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let data = ConfigData::deserialize(&content, format)?.flattened();
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("file")
            .to_string();
        log::info!("Loaded configuration '{}' from {}", name, path.display());
        Ok(Self::new(name, priority, data))
    }
}
