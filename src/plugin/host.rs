//! Plugin trait and factory registry
//!
//! The activation mechanism: a plugin exposes a registration entry point
//! the loader invokes, instead of having arbitrary code included at boot.

use std::collections::BTreeMap;

use anyhow::Result;

use crate::parsers::Shortcodes;
use crate::pipeline::Pipeline;

/// Extension points a plugin can contribute to during registration.
pub struct Extensions<'a> {
    pub pipeline: &'a mut Pipeline,
    pub shortcodes: &'a mut Shortcodes,
}

/// A plugin's bootstrap code.
pub trait Plugin: Send + Sync {
    /// Directory name of the plugin, matching `.loam/plugins/{name}/`.
    fn name(&self) -> &str;

    /// Called exactly once when the plugin activates, in priority order.
    fn register(&self, extensions: &mut Extensions) -> Result<()>;

    /// Called after every plugin has activated.
    fn on_ready(&self) {}
}

/// Registry of available plugin implementations, keyed by directory name.
///
/// A plugin directory without a matching registration here is excluded
/// from discovery, just like a directory missing its manifest.
#[derive(Default)]
pub struct PluginHost {
    plugins: BTreeMap<String, Box<dyn Plugin>>,
}

impl PluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin implementation under its name.
    pub fn add(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&dyn Plugin> {
        self.plugins.get(name).map(|plugin| plugin.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.keys().map(String::as_str).collect()
    }
}
