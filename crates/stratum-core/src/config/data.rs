use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::error::ConfigError;
use crate::kernel::error::Result;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON format (.json)
    Json,
    /// YAML format (.yaml, .yml) - requires "yaml-config" feature
    #[cfg(feature = "yaml-config")]
    Yaml,
    /// TOML format (.toml) - requires "toml-config" feature
    #[cfg(feature = "toml-config")]
    Toml,
}

impl ConfigFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => "yaml",
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => "toml",
        }
    }

    /// Determine format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "json" => Some(ConfigFormat::Json),
                #[cfg(feature = "yaml-config")]
                "yaml" | "yml" => Some(ConfigFormat::Yaml),
                #[cfg(feature = "toml-config")]
                "toml" => Some(ConfigFormat::Toml),
                _ => None,
            })
    }
}

/// Flat key/value configuration; nested keys are dot-separated (`log.level`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigData {
    #[serde(flatten)]
    values: HashMap<String, Value>,
}

impl ConfigData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|e| ConfigError::Serialization {
            format: "json".to_string(),
            message: e.to_string(),
        })?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rewrite nested objects as dot-separated keys: `{"log": {"level": "x"}}`
    /// becomes `log.level = "x"`. Arrays and scalars are kept as leaves.
    pub fn flattened(self) -> Self {
        let mut values = HashMap::new();
        for (key, value) in self.values {
            flatten_into(&key, value, &mut values);
        }
        Self { values }
    }

    pub fn deserialize(data: &str, format: ConfigFormat) -> Result<Self> {
        let parsed: std::result::Result<Self, String> = match format {
            ConfigFormat::Json => serde_json::from_str(data).map_err(|e| e.to_string()),
            #[cfg(feature = "yaml-config")]
            ConfigFormat::Yaml => serde_yaml::from_str(data).map_err(|e| e.to_string()),
            #[cfg(feature = "toml-config")]
            ConfigFormat::Toml => toml::from_str(data).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| {
            ConfigError::Deserialization { format: format.extension().to_string(), message }.into()
        })
    }
}

fn flatten_into(prefix: &str, value: Value, out: &mut HashMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                flatten_into(&format!("{}.{}", prefix, key), nested, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other);
        }
    }
}

/// Group dot-separated keys back into a nested JSON object.
pub(crate) fn nest(entries: impl IntoIterator<Item = (String, Value)>) -> Value {
    let mut root = Map::new();
    'entries: for (key, value) in entries {
        let mut parts: Vec<&str> = key.split('.').collect();
        let Some(leaf) = parts.pop() else { continue };
        let mut cursor = &mut root;
        for part in parts {
            let slot = cursor.entry(part.to_string()).or_insert_with(|| Value::Object(Map::new()));
            // A deeper key wins over a scalar at its parent path
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            match slot.as_object_mut() {
                Some(next) => cursor = next,
                None => continue 'entries,
            }
        }
        cursor.insert(leaf.to_string(), value);
    }
    Value::Object(root)
}
