//! Configuration handling for Loam
//!
//! Site settings live in `.loam/settings.yaml` and overlay compiled-in
//! defaults: every struct here is `#[serde(default)]`, so a settings file
//! only needs the keys it changes. Global user preferences live in
//! `~/.config/loam/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// A single on/off switch for a field, directive, or shortcode handler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Toggle {
    pub enabled: bool,
}

impl Default for Toggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Cache backend selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheDriverKind {
    /// Probe sqlite, fall back to memory.
    #[default]
    Auto,
    Memory,
    File,
    Sqlite,
    Null,
}

impl CacheDriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheDriverKind::Auto => "auto",
            CacheDriverKind::Memory => "memory",
            CacheDriverKind::File => "file",
            CacheDriverKind::Sqlite => "sqlite",
            CacheDriverKind::Null => "null",
        }
    }
}

/// Cache gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Disabling substitutes the null driver; callers see only misses.
    pub enabled: bool,

    /// Backing driver.
    pub driver: CacheDriverKind,

    /// Default time-to-live in seconds. None means no expiry.
    pub ttl: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            driver: CacheDriverKind::Auto,
            ttl: None,
        }
    }
}

/// Reserved entry fields, each individually switchable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EntryFieldsSettings {
    pub uuid: Toggle,
    pub created_at: Toggle,
    pub published_at: Toggle,
    pub published_by: Toggle,
    pub routable: Toggle,
    pub modified_at: Toggle,
}

/// Fetch-time directives, each individually switchable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DirectivesSettings {
    pub markdown: Toggle,
    pub shortcodes: Toggle,
    pub types: Toggle,
    pub vars: Toggle,
}

/// Entries pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EntriesSettings {
    pub fields: EntryFieldsSettings,
    pub directives: DirectivesSettings,
}

/// Media pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MediaSettings {
    pub fields: MediaFieldsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MediaFieldsSettings {
    pub modified_at: Toggle,
}

/// Markdown parser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownSettings {
    pub enabled: bool,

    /// Cache rendered output keyed by input text.
    pub cache: bool,
}

impl Default for MarkdownSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cache: true,
        }
    }
}

/// Shortcode parser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcodesSettings {
    /// When enabled, string fields without an explicit `@shortcodes` marker
    /// are still parsed implicitly during fetch.
    pub enabled: bool,

    /// Cache expansions keyed by input text.
    pub cache: bool,

    pub handlers: ShortcodeHandlersSettings,
}

impl Default for ShortcodesSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            cache: true,
            handlers: ShortcodeHandlersSettings::default(),
        }
    }
}

/// Built-in shortcode handlers, each individually switchable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ShortcodeHandlersSettings {
    pub raw: Toggle,
    pub markdown: Toggle,
    pub url: Toggle,
    pub entries_fetch: Toggle,
}

/// Parser settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ParsersSettings {
    pub markdown: MarkdownSettings,
    pub shortcodes: ShortcodesSettings,
}

/// Frontmatter serializer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontmatterSettings {
    /// Header sub-format: yaml (default), json, or toml. Unknown values
    /// and "frontmatter" itself fall back to yaml.
    pub header: String,

    /// Cache decoded records keyed by input text.
    pub cache: bool,
}

impl Default for FrontmatterSettings {
    fn default() -> Self {
        Self {
            header: "yaml".to_string(),
            cache: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SerializersSettings {
    pub frontmatter: FrontmatterSettings,
}

/// Site-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL reported by the `[url]` shortcode.
    pub base_url: String,

    /// Locale used for plugin translation dictionaries.
    pub locale: String,

    /// chrono format string for generated date fields.
    pub date_format: String,

    pub cache: CacheSettings,
    pub entries: EntriesSettings,
    pub media: MediaSettings,
    pub parsers: ParsersSettings,
    pub serializers: SerializersSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            locale: "en_US".to_string(),
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
            cache: CacheSettings::default(),
            entries: EntriesSettings::default(),
            media: MediaSettings::default(),
            parsers: ParsersSettings::default(),
            serializers: SerializersSettings::default(),
        }
    }
}

impl Settings {
    /// Loads settings for a site root, overlaying `.loam/settings.yaml`
    /// onto the defaults. A missing file yields the defaults.
    pub fn load(site_root: &Path) -> Result<Self> {
        let path = site_root.join(".loam").join("settings.yaml");

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    /// Saves settings to `.loam/settings.yaml`.
    pub fn save(&self, site_root: &Path) -> Result<()> {
        let path = site_root.join(".loam").join("settings.yaml");
        let content = serde_yaml::to_string(self).context("Failed to serialize settings")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write settings: {}", path.display()))
    }
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,
}

impl GlobalConfig {
    /// Returns the global config directory
    pub fn dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "loam", "loam").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Loads the global configuration, defaulting when absent.
    pub fn load() -> Result<Self> {
        let config_dir = match Self::dir() {
            Some(dir) => dir,
            None => return Ok(Self::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    /// Saves the global configuration
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        fs::create_dir_all(&config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize global config")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write global config: {}", config_path.display()))
    }
}
