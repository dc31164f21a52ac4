use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::kernel::error::Result;
use crate::plugin_system::error::PluginSystemError;

/// Functional area a plugin contributes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PluginCategory {
    DataProvider,
    AiProvider,
    Analytics,
    OutputFormat,
    Ui,
    Workflow,
    Integration,
    #[default]
    Utility,
}

impl PluginCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginCategory::DataProvider => "data-provider",
            PluginCategory::AiProvider => "ai-provider",
            PluginCategory::Analytics => "analytics",
            PluginCategory::OutputFormat => "output-format",
            PluginCategory::Ui => "ui",
            PluginCategory::Workflow => "workflow",
            PluginCategory::Integration => "integration",
            PluginCategory::Utility => "utility",
        }
    }

    /// Parse the kebab-case wire name
    pub fn parse(name: &str) -> Option<Self> {
        let category = match name {
            "data-provider" => PluginCategory::DataProvider,
            "ai-provider" => PluginCategory::AiProvider,
            "analytics" => PluginCategory::Analytics,
            "output-format" => PluginCategory::OutputFormat,
            "ui" => PluginCategory::Ui,
            "workflow" => PluginCategory::Workflow,
            "integration" => PluginCategory::Integration,
            "utility" => PluginCategory::Utility,
            _ => return None,
        };
        Some(category)
    }
}

impl fmt::Display for PluginCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a plugin manifest that describes a plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginManifest {
    /// Unique identifier for the plugin
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Plugin version (semver)
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub category: PluginCategory,

    /// Ids of plugins that must be active before this one registers
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Key used by a plugin loader to construct the instance
    #[serde(default)]
    pub entry_point: String,

    /// Declared permissions; informational only
    #[serde(default)]
    pub permissions: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// JSON schema describing the plugin configuration (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<Value>,
}

impl PluginManifest {
    /// Create a new plugin manifest
    pub fn new(id: &str, name: &str, version: &str, category: PluginCategory) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            description: String::new(),
            author: String::new(),
            category,
            dependencies: Vec::new(),
            entry_point: id.to_string(),
            permissions: Vec::new(),
            tags: Vec::new(),
            config_schema: None,
        }
    }

    /// Parse a manifest from its JSON form and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: PluginManifest = serde_json::from_str(json).map_err(|e| PluginSystemError::InvalidManifest {
            plugin_id: "<unknown>".to_string(),
            message: e.to_string(),
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the fields every registration relies on
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| PluginSystemError::InvalidManifest {
            plugin_id: self.id.clone(),
            message,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty".to_string()).into());
        }
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()).into());
        }
        if let Err(e) = semver::Version::parse(&self.version) {
            return Err(invalid(format!("version '{}' is not valid semver: {}", self.version, e)).into());
        }
        if self.dependencies.iter().any(|dep| dep == &self.id) {
            return Err(invalid("a plugin cannot depend on itself".to_string()).into());
        }
        Ok(())
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Builder for creating a plugin manifest
pub struct ManifestBuilder {
    manifest: PluginManifest,
}

impl ManifestBuilder {
    pub fn new(id: &str, name: &str, version: &str) -> Self {
        Self { manifest: PluginManifest::new(id, name, version, PluginCategory::default()) }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.manifest.description = description.to_string();
        self
    }

    pub fn author(mut self, author: &str) -> Self {
        self.manifest.author = author.to_string();
        self
    }

    pub fn category(mut self, category: PluginCategory) -> Self {
        self.manifest.category = category;
        self
    }

    pub fn dependency(mut self, id: &str) -> Self {
        self.manifest.dependencies.push(id.to_string());
        self
    }

    pub fn entry_point(mut self, entry_point: &str) -> Self {
        self.manifest.entry_point = entry_point.to_string();
        self
    }

    pub fn permission(mut self, permission: &str) -> Self {
        self.manifest.permissions.push(permission.to_string());
        self
    }

    /// Add multiple tags to the plugin
    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.manifest.tags.extend(tags.iter().map(|t| t.to_string()));
        self
    }

    pub fn config_schema(mut self, schema: Value) -> Self {
        self.manifest.config_schema = Some(schema);
        self
    }

    pub fn build(self) -> PluginManifest {
        self.manifest
    }
}
