//! Plugin discovery, validation, ordering, and dependency resolution
//!
//! Boot sequence per load:
//!
//! ```text
//! Discover -> ValidateManifests -> Sort(priority) -> FilterEnabled
//!          -> ResolveDependencies -> (Activate, done by the Site)
//! ```
//!
//! The computed records and translation dictionary are cached keyed by the
//! modification times of every plugin's settings, manifest, and project
//! override file; a cache hit skips all re-parsing. Regeneration is
//! deterministic given the same input files, so concurrent rebuilds are
//! harmless.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::domain::{self, Fields};
use crate::storage::cache::{cache_id, CacheGateway};
use super::host::PluginHost;
use super::i18n::Dictionary;
use super::manifest::{PluginManifest, PluginRecord, PluginSettings};
use super::PluginError;

/// A plugin directory that passed discovery.
#[derive(Debug, Clone)]
pub struct DiscoveredPlugin {
    /// Directory name.
    pub name: String,

    /// Absolute plugin directory.
    pub dir: PathBuf,
}

/// The cached result of a plugin boot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadedPlugins {
    /// Activation set, in activation order.
    pub records: Vec<PluginRecord>,

    /// Merged translation dictionary for the configured locale.
    pub dictionary: Dictionary,
}

/// Discovers, validates, and orders plugins.
pub struct PluginLoader<'a> {
    plugins_dir: PathBuf,
    overrides_dir: PathBuf,
    locale: String,
    host_version: semver::Version,
    cache: &'a CacheGateway,
}

impl<'a> PluginLoader<'a> {
    pub fn new(
        plugins_dir: PathBuf,
        overrides_dir: PathBuf,
        locale: String,
        host_version: semver::Version,
        cache: &'a CacheGateway,
    ) -> Self {
        Self {
            plugins_dir,
            overrides_dir,
            locale,
            host_version,
            cache,
        }
    }

    /// Enumerates plugin directories containing both required files and a
    /// registered implementation. Directories missing any are silently
    /// excluded.
    pub fn discover(&self, host: &PluginHost) -> Result<Vec<DiscoveredPlugin>> {
        if !self.plugins_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut discovered = Vec::new();

        for entry in fs::read_dir(&self.plugins_dir).with_context(|| {
            format!("Failed to read plugins dir: {}", self.plugins_dir.display())
        })? {
            let entry = entry.context("Failed to read directory entry")?;
            let dir = entry.path();

            if !dir.is_dir() {
                continue;
            }

            let Some(name) = dir.file_name().and_then(|n| n.to_str()).map(String::from)
            else {
                continue;
            };

            if dir.join("plugin.yaml").exists()
                && dir.join("settings.yaml").exists()
                && host.contains(&name)
            {
                discovered.push(DiscoveredPlugin { name, dir });
            }
        }

        // Name order keeps the cache key stable across directory listings.
        discovered.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(discovered)
    }

    /// Derives the boot cache key from the mtimes of every plugin's
    /// settings, manifest, and project override file.
    pub fn cache_key(&self, discovered: &[DiscoveredPlugin]) -> String {
        let mut material = self.plugins_dir.display().to_string();

        for plugin in discovered {
            material.push_str(&mtime_token(&plugin.dir.join("settings.yaml")));
            material.push_str(&mtime_token(&plugin.dir.join("plugin.yaml")));
            material.push_str(&mtime_token(
                &self.overrides_dir.join(&plugin.name).join("settings.yaml"),
            ));
        }

        cache_id("plugins", &material)
    }

    /// Loads the activation set, consulting the boot cache.
    pub fn load(&self, host: &PluginHost) -> Result<LoadedPlugins> {
        let discovered = self.discover(host)?;

        if discovered.is_empty() {
            return Ok(LoadedPlugins::default());
        }

        let key = self.cache_key(&discovered);

        if let Some(cached) = self.cache.get(&key) {
            if let Ok(loaded) = serde_json::from_value::<LoadedPlugins>(cached) {
                debug!("plugin boot cache hit");
                return Ok(loaded);
            }
        }

        let loaded = self.build(&discovered)?;

        if let Ok(value) = serde_json::to_value(&loaded) {
            self.cache.set(&key, value);
        }

        Ok(loaded)
    }

    fn build(&self, discovered: &[DiscoveredPlugin]) -> Result<LoadedPlugins> {
        let mut records = Vec::new();

        for plugin in discovered {
            records.push(self.read_record(plugin)?);
        }

        // Sort ascending by priority, name as the stable tiebreak.
        records.sort_by(|a, b| {
            (a.settings.priority, a.name.as_str()).cmp(&(b.settings.priority, b.name.as_str()))
        });

        let enabled: Vec<PluginRecord> =
            records.into_iter().filter(|r| r.settings.enabled).collect();

        let verified = self.verify_dependencies(enabled)?;
        let dictionary = self.build_dictionary(discovered)?;

        Ok(LoadedPlugins {
            records: verified,
            dictionary,
        })
    }

    fn read_record(&self, plugin: &DiscoveredPlugin) -> Result<PluginRecord> {
        // Default settings merged with the project-level override.
        let default_settings = read_yaml_fields(&plugin.dir.join("settings.yaml"))
            .map_err(|e| PluginError::Settings(plugin.name.clone(), e.to_string()))?;

        let override_path = self.overrides_dir.join(&plugin.name).join("settings.yaml");
        let mut merged = default_settings;

        if override_path.exists() {
            let override_settings = read_yaml_fields(&override_path)
                .map_err(|e| PluginError::Settings(plugin.name.clone(), e.to_string()))?;
            domain::merge(&mut merged, &override_settings);
        }

        let manifest_path = plugin.dir.join("plugin.yaml");
        let manifest_raw = fs::read_to_string(&manifest_path)
            .map_err(|e| PluginError::Manifest(plugin.name.clone(), e.to_string()))?;
        let manifest: PluginManifest = serde_yaml::from_str(&manifest_raw)
            .map_err(|e| PluginError::Manifest(plugin.name.clone(), e.to_string()))?;

        Ok(PluginRecord {
            name: plugin.name.clone(),
            manifest,
            settings: PluginSettings::from_fields(merged),
        })
    }

    /// Removes plugins with unsatisfied dependency constraints, and
    /// transitively everything that requires them. Any removal is a fatal
    /// misconfiguration reported with the offending plugin names.
    fn verify_dependencies(&self, records: Vec<PluginRecord>) -> Result<Vec<PluginRecord>> {
        let index_by_name: HashMap<&str, usize> = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.as_str(), i))
            .collect();

        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..records.len()).map(|i| graph.add_node(i)).collect();

        let mut unsatisfied: Vec<usize> = Vec::new();

        for (i, record) in records.iter().enumerate() {
            for (dependency, constraint) in &record.manifest.dependencies {
                let requirement = semver::VersionReq::parse(constraint).map_err(|_| {
                    PluginError::InvalidConstraint {
                        plugin: record.name.clone(),
                        dependency: dependency.clone(),
                        constraint: constraint.clone(),
                    }
                })?;

                if dependency == "loam" {
                    if !requirement.matches(&self.host_version) {
                        unsatisfied.push(i);
                    }
                    continue;
                }

                match index_by_name.get(dependency.as_str()) {
                    Some(&dep_index) => {
                        graph.add_edge(nodes[dep_index], nodes[i], ());

                        if !requirement.matches(&records[dep_index].manifest.version) {
                            unsatisfied.push(i);
                        }
                    }
                    None => unsatisfied.push(i),
                }
            }
        }

        // Everything reachable from an unsatisfied plugin along
        // dependency edges goes with it.
        let mut removed: HashSet<usize> = HashSet::new();

        for &start in &unsatisfied {
            let mut bfs = Bfs::new(&graph, nodes[start]);
            while let Some(node) = bfs.next(&graph) {
                removed.insert(graph[node]);
            }
        }

        if !removed.is_empty() {
            let mut names: Vec<String> = removed
                .iter()
                .map(|&i| records[i].name.clone())
                .collect();
            names.sort();

            return Err(PluginError::DependenciesNotMet(names).into());
        }

        Ok(records)
    }

    fn build_dictionary(&self, discovered: &[DiscoveredPlugin]) -> Result<Dictionary> {
        let mut dictionary = Dictionary::new();

        for plugin in discovered {
            let lang_file = plugin.dir.join("lang").join(format!("{}.yaml", self.locale));

            if !lang_file.exists() {
                continue;
            }

            let content = fs::read_to_string(&lang_file).with_context(|| {
                format!("Load file: {} - failed", lang_file.display())
            })?;

            dictionary
                .merge_yaml(&self.locale, &content)
                .with_context(|| format!("Load file: {} - failed", lang_file.display()))?;
        }

        Ok(dictionary)
    }
}

fn read_yaml_fields(path: &Path) -> Result<Fields> {
    let content =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(Fields::new());
    }

    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("parse {}", path.display()))?;

    match value {
        Value::Object(fields) => Ok(fields),
        _ => Ok(Fields::new()),
    }
}

fn mtime_token(path: &Path) -> String {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| format!("{}.{}", d.as_secs(), d.subsec_nanos()))
        .unwrap_or_default()
}
