//! Plugin manifest and settings
//!
//! `plugin.yaml` declares identity, version, and dependency constraints;
//! `settings.yaml` holds the enabled flag, priority, and arbitrary
//! plugin-specific options. Project-level overrides from
//! `.loam/config/plugins/{name}/settings.yaml` are merged recursively
//! over the defaults, override winning per key.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::Fields;

/// Priority assigned when a plugin's settings leave it unset.
pub const DEFAULT_PRIORITY: u32 = 100;

/// Plugin manifest (`plugin.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name
    pub name: String,

    /// Plugin version
    pub version: semver::Version,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Dependency name to semver constraint. The name `loam` refers to
    /// the host application version.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

/// Merged plugin settings (`settings.yaml` plus project override).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSettings {
    /// Only settings-enabled plugins activate. Missing means disabled.
    pub enabled: bool,

    /// Activation order, ascending. Defaults to [`DEFAULT_PRIORITY`].
    pub priority: u32,

    /// The full merged settings map, including plugin-specific options.
    pub options: Fields,
}

impl PluginSettings {
    /// Interprets a merged settings map.
    pub fn from_fields(options: Fields) -> Self {
        let enabled = options
            .get("enabled")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let priority = options
            .get("priority")
            .and_then(Value::as_u64)
            .map(|p| p as u32)
            .unwrap_or(DEFAULT_PRIORITY);

        Self {
            enabled,
            priority,
            options,
        }
    }

    /// Returns a plugin-specific option by dotted path.
    pub fn option(&self, path: &str) -> Option<&Value> {
        crate::domain::get(&self.options, path)
    }
}

/// A validated plugin with its manifest and merged settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRecord {
    /// Directory name under `.loam/plugins/`.
    pub name: String,

    pub manifest: PluginManifest,
    pub settings: PluginSettings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn manifest_parses_from_yaml() {
        let yaml = r#"
name: Blog
version: 1.2.0
description: Blog plugin
dependencies:
  loam: ">=0.1.0"
  seo: "^2.0"
"#;

        let manifest: PluginManifest = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(manifest.name, "Blog");
        assert_eq!(manifest.version, semver::Version::new(1, 2, 0));
        assert_eq!(manifest.dependencies.get("seo"), Some(&"^2.0".to_string()));
    }

    #[test]
    fn manifest_requires_version() {
        let result: Result<PluginManifest, _> = serde_yaml::from_str("name: Broken");

        assert!(result.is_err());
    }

    #[test]
    fn settings_default_priority_and_disabled() {
        let settings = PluginSettings::from_fields(Fields::new());

        assert!(!settings.enabled);
        assert_eq!(settings.priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn settings_read_enabled_and_priority() {
        let options: Fields =
            serde_json::from_value(json!({"enabled": true, "priority": 10, "color": "red"}))
                .unwrap();
        let settings = PluginSettings::from_fields(options);

        assert!(settings.enabled);
        assert_eq!(settings.priority, 10);
        assert_eq!(settings.option("color"), Some(&json!("red")));
    }
}
