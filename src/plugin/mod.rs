//! # Plugin System
//!
//! Plugins extend the pipeline and the shortcode registry. Each plugin is
//! a directory under `.loam/plugins/{name}/` holding:
//!
//! | File | Purpose |
//! |------|---------|
//! | `plugin.yaml` | Manifest: name, version, dependency constraints |
//! | `settings.yaml` | Enabled flag, priority, plugin-specific options |
//! | `lang/{locale}.yaml` | Optional translations |
//!
//! Activation code is not included from disk; a plugin's bootstrap is a
//! [`Plugin`] implementation registered with the [`PluginHost`] under the
//! directory name. The loader validates manifests, orders plugins by
//! ascending priority, filters to enabled ones, verifies semver dependency
//! constraints (removing dependents transitively and failing the boot when
//! anything was removed), and then calls each survivor's `register` hook
//! exactly once, in order.
//!
//! The computed activation set and translation dictionary are cached keyed
//! by the modification times of the involved files, so an unchanged plugin
//! directory boots without re-parsing anything.

mod host;
mod i18n;
mod loader;
mod manifest;

pub use host::{Extensions, Plugin, PluginHost};
pub use i18n::Dictionary;
pub use loader::{DiscoveredPlugin, LoadedPlugins, PluginLoader};
pub use manifest::{PluginManifest, PluginRecord, PluginSettings};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Load {0} plugin manifest - failed: {1}")]
    Manifest(String, String),

    #[error("Load {0} plugin settings - failed: {1}")]
    Settings(String, String),

    #[error("Invalid dependency constraint '{constraint}' on '{dependency}' in plugin '{plugin}'")]
    InvalidConstraint {
        plugin: String,
        dependency: String,
        constraint: String,
    },

    #[error("Dependencies need to be installed properly for these plugins: {}", .0.join(", "))]
    DependenciesNotMet(Vec<String>),
}
