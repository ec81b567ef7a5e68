//! Site management
//!
//! A [`Site`] is the explicit service container for one content root:
//! settings, cache gateway, parsers, pipeline, and the activated plugin
//! set, wired together at open time and passed by reference into the
//! content services. There are no process-wide singletons; everything a
//! component needs arrives through a constructor or a context struct.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::debug;

use crate::content::{Entries, Media};
use crate::parsers::{Markdown, Parsers, Shortcodes};
use crate::pipeline::Pipeline;
use crate::plugin::{Extensions, LoadedPlugins, PluginHost, PluginLoader};
use super::cache::CacheGateway;
use super::config::Settings;
use super::frontmatter::Frontmatter;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("Not in a loam site. Run 'loam init' first.")]
    NotASite,

    #[error("Failed to create site: {0}")]
    CreateFailed(String),
}

/// Builder for a [`Site`], the place to register plugin implementations
/// before the loader runs.
pub struct SiteBuilder {
    root: PathBuf,
    host: PluginHost,
}

impl SiteBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            host: PluginHost::new(),
        }
    }

    /// Registers a plugin implementation for activation.
    pub fn with_plugin(mut self, plugin: Box<dyn crate::plugin::Plugin>) -> Self {
        self.host.add(plugin);
        self
    }

    /// Opens the site: loads settings, builds the cache and parsers,
    /// registers built-in extensions, and activates plugins.
    pub fn open(self) -> Result<Site> {
        let root = self.root;
        let loam_dir = root.join(".loam");

        if !loam_dir.is_dir() {
            return Err(SiteError::NotASite.into());
        }

        let settings = Settings::load(&root)?;
        let cache = CacheGateway::from_settings(&settings.cache, &loam_dir.join("cache"));
        let frontmatter = Frontmatter::new(&settings.serializers.frontmatter);
        let markdown = Markdown::new(&settings.parsers.markdown);
        let mut shortcodes = Shortcodes::with_builtins(&settings.parsers.shortcodes);
        let mut pipeline = Pipeline::with_builtins();

        let host_version = semver::Version::parse(crate::VERSION)
            .context("Failed to parse host version")?;

        let loader = PluginLoader::new(
            loam_dir.join("plugins"),
            loam_dir.join("config").join("plugins"),
            settings.locale.clone(),
            host_version,
            &cache,
        );

        let plugins = loader.load(&self.host)?;

        // Activate in sorted order, each exactly once.
        for record in &plugins.records {
            let plugin = self
                .host
                .get(&record.name)
                .expect("discovered plugins have a registered implementation");

            let mut extensions = Extensions {
                pipeline: &mut pipeline,
                shortcodes: &mut shortcodes,
            };

            plugin
                .register(&mut extensions)
                .with_context(|| format!("Failed to activate plugin '{}'", record.name))?;

            debug!(name = record.name.as_str(), "activated plugin");
        }

        // Lifecycle notification after all activations complete.
        for record in &plugins.records {
            if let Some(plugin) = self.host.get(&record.name) {
                plugin.on_ready();
            }
        }

        Ok(Site {
            root,
            settings,
            cache,
            frontmatter,
            parsers: Parsers::new(markdown, shortcodes),
            pipeline,
            plugins,
        })
    }
}

/// A loam site.
pub struct Site {
    root: PathBuf,
    settings: Settings,
    cache: CacheGateway,
    frontmatter: Frontmatter,
    parsers: Parsers,
    pipeline: Pipeline,
    plugins: LoadedPlugins,
}

impl std::fmt::Debug for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Site").field("root", &self.root).finish_non_exhaustive()
    }
}

impl Site {
    /// Opens an existing site at the given path with no plugins.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        SiteBuilder::new(root).open()
    }

    /// Returns a builder to register plugins before opening.
    pub fn builder(root: impl Into<PathBuf>) -> SiteBuilder {
        SiteBuilder::new(root)
    }

    /// Opens the site at the current directory or a parent.
    pub fn open_current() -> Result<Self> {
        let root = Self::find_site_root().ok_or(SiteError::NotASite)?;
        Self::open(root)
    }

    /// Finds the site root by walking up from the current directory.
    pub fn find_site_root() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            if current.join(".loam").is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Initializes a new site at the given path. Idempotent.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let loam_dir = root.join(".loam");

        for dir in [
            loam_dir.clone(),
            loam_dir.join("entries"),
            loam_dir.join("media"),
            loam_dir.join("plugins"),
            loam_dir.join("config").join("plugins"),
            loam_dir.join("cache"),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let settings_path = loam_dir.join("settings.yaml");
        if !settings_path.exists() {
            let default_settings = r#"# Loam site configuration
# Every key is optional; omitted keys keep their defaults.

# Base URL reported by the [url] shortcode
base_url: ""

# Locale for plugin translation dictionaries
locale: en_US

# Format for generated date fields
date_format: "%Y-%m-%d %H:%M:%S"

cache:
  enabled: true
  # auto probes sqlite, then falls back to memory.
  # Other drivers: memory, file, sqlite, null
  driver: auto
"#;
            fs::write(&settings_path, default_settings).with_context(|| {
                format!("Failed to write settings: {}", settings_path.display())
            })?;
        }

        let gitignore_path = loam_dir.join(".gitignore");
        if !gitignore_path.exists() {
            let gitignore = "# Cache is derived state\ncache/\n";
            fs::write(&gitignore_path, gitignore).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        Self::open(root)
    }

    /// Returns the site root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the `.loam` directory path.
    pub fn loam_dir(&self) -> PathBuf {
        self.root.join(".loam")
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &CacheGateway {
        &self.cache
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn parsers(&self) -> &Parsers {
        &self.parsers
    }

    pub fn frontmatter(&self) -> &Frontmatter {
        &self.frontmatter
    }

    /// Returns the activated plugin set.
    pub fn plugins(&self) -> &LoadedPlugins {
        &self.plugins
    }

    /// Looks up a plugin translation for the configured locale.
    pub fn translate(&self, key: &str) -> Option<&str> {
        self.plugins.dictionary.translate(&self.settings.locale, key)
    }

    /// Returns the entries service.
    pub fn entries(&self) -> Entries<'_> {
        Entries::new(
            self.loam_dir().join("entries"),
            &self.settings,
            &self.cache,
            &self.pipeline,
            &self.parsers,
            &self.frontmatter,
        )
    }

    /// Returns the media service.
    pub fn media(&self) -> Media<'_> {
        Media::new(
            self.loam_dir().join("media"),
            &self.settings,
            &self.cache,
            &self.pipeline,
            &self.parsers,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_creates_structure() {
        let dir = TempDir::new().unwrap();
        let site = Site::init(dir.path()).unwrap();

        assert!(site.loam_dir().is_dir());
        assert!(site.loam_dir().join("entries").is_dir());
        assert!(site.loam_dir().join("media").is_dir());
        assert!(site.loam_dir().join("plugins").is_dir());
        assert!(site.loam_dir().join("config").join("plugins").is_dir());
        assert!(site.loam_dir().join("settings.yaml").is_file());
        assert!(site.loam_dir().join(".gitignore").is_file());
    }

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();

        Site::init(dir.path()).unwrap();
        Site::init(dir.path()).unwrap();

        assert!(dir.path().join(".loam").is_dir());
    }

    #[test]
    fn open_non_site_fails() {
        let dir = TempDir::new().unwrap();

        assert!(Site::open(dir.path()).is_err());
    }

    #[test]
    fn entries_and_media_are_accessible() {
        let dir = TempDir::new().unwrap();
        let site = Site::init(dir.path()).unwrap();

        assert!(site.entries().dir().ends_with("entries"));
        assert!(site.media().dir().ends_with("media"));
    }

    #[test]
    fn settings_file_is_respected() {
        let dir = TempDir::new().unwrap();
        Site::init(dir.path()).unwrap();

        fs::write(
            dir.path().join(".loam").join("settings.yaml"),
            "base_url: https://example.org\ncache:\n  driver: memory\n",
        )
        .unwrap();

        let site = Site::open(dir.path()).unwrap();

        assert_eq!(site.settings().base_url, "https://example.org");
        assert_eq!(site.cache().driver_name(), "memory");
    }
}
