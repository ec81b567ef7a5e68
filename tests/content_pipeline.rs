//! Library-level integration tests for the content pipeline
//!
//! Covers the end-to-end behavior that spans services: plugin activation
//! feeding the pipeline and shortcode registry, dependency rejection at
//! site open, and the serializer/cache properties.

use std::fs;
use std::path::Path;

use anyhow::Result;
use proptest::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

use loam_cms::domain::Fields;
use loam_cms::parsers::ShortcodeError;
use loam_cms::pipeline::{FetchResultContext, FieldExtension};
use loam_cms::plugin::{Extensions, Plugin};
use loam_cms::storage::{cache_id, Frontmatter, Site};

fn record(value: serde_json::Value) -> Fields {
    serde_json::from_value(value).unwrap()
}

fn write_plugin(root: &Path, name: &str, manifest: &str, settings: &str) {
    let dir = root.join(".loam").join("plugins").join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("plugin.yaml"), manifest).unwrap();
    fs::write(dir.join("settings.yaml"), settings).unwrap();
}

/// A plugin that marks fetched entries and contributes a shortcode.
struct MarkerPlugin {
    name: &'static str,
}

struct MarkerField {
    name: &'static str,
}

impl FieldExtension for MarkerField {
    fn name(&self) -> &str {
        self.name
    }

    fn on_fetch_result(&self, ctx: &mut FetchResultContext) -> Result<()> {
        let trace = ctx
            .result
            .get("trace")
            .and_then(Value::as_str)
            .unwrap_or_default();

        ctx.result.insert(
            "trace".to_string(),
            Value::String(format!("{}{},", trace, self.name)),
        );

        Ok(())
    }
}

impl Plugin for MarkerPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn register(&self, extensions: &mut Extensions) -> Result<()> {
        extensions.pipeline.register(Box::new(MarkerField { name: self.name }));

        let name = self.name;
        extensions
            .shortcodes
            .add_handler(name, move |_call, _ctx| -> Result<String, ShortcodeError> {
                Ok(format!("<{}>", name))
            });

        Ok(())
    }
}

#[test]
fn plugin_extensions_join_the_pipeline() {
    let dir = TempDir::new().unwrap();
    Site::init(dir.path()).unwrap();
    write_plugin(
        dir.path(),
        "marker",
        "name: Marker\nversion: 1.0.0\n",
        "enabled: true\n",
    );

    let site = Site::builder(dir.path())
        .with_plugin(Box::new(MarkerPlugin { name: "marker" }))
        .open()
        .unwrap();

    let entries = site.entries();
    entries
        .create("post", record(json!({"teaser": "[marker]"})))
        .unwrap();

    let fetched = entries.fetch("post").unwrap();

    // The plugin's field extension enriched the result...
    assert_eq!(fetched.get("trace"), Some(&json!("marker,")));
    // ...and its shortcode handler expanded during fetch.
    assert_eq!(fetched.get("teaser"), Some(&json!("<marker>")));
}

#[test]
fn plugins_activate_in_ascending_priority_order() {
    let dir = TempDir::new().unwrap();
    Site::init(dir.path()).unwrap();

    write_plugin(
        dir.path(),
        "late",
        "name: Late\nversion: 1.0.0\n",
        "enabled: true\npriority: 50\n",
    );
    write_plugin(
        dir.path(),
        "early",
        "name: Early\nversion: 1.0.0\n",
        "enabled: true\npriority: 10\n",
    );

    let site = Site::builder(dir.path())
        .with_plugin(Box::new(MarkerPlugin { name: "late" }))
        .with_plugin(Box::new(MarkerPlugin { name: "early" }))
        .open()
        .unwrap();

    let entries = site.entries();
    entries.create("post", Fields::new()).unwrap();
    let fetched = entries.fetch("post").unwrap();

    // Fetch-result extensions ran in activation order.
    assert_eq!(fetched.get("trace"), Some(&json!("early,late,")));
}

#[test]
fn unmet_dependency_fails_site_open() {
    let dir = TempDir::new().unwrap();
    Site::init(dir.path()).unwrap();

    write_plugin(
        dir.path(),
        "needy",
        "name: Needy\nversion: 1.0.0\ndependencies:\n  loam: \">=99.0.0\"\n",
        "enabled: true\n",
    );

    let result = Site::builder(dir.path())
        .with_plugin(Box::new(MarkerPlugin { name: "needy" }))
        .open();

    let message = format!("{:#}", result.unwrap_err());
    assert!(message.contains("needy"), "{message}");
}

#[test]
fn disabled_plugin_is_not_activated() {
    let dir = TempDir::new().unwrap();
    Site::init(dir.path()).unwrap();

    write_plugin(
        dir.path(),
        "marker",
        "name: Marker\nversion: 1.0.0\n",
        "enabled: false\n",
    );

    let site = Site::builder(dir.path())
        .with_plugin(Box::new(MarkerPlugin { name: "marker" }))
        .open()
        .unwrap();

    assert!(site.plugins().records.is_empty());

    let entries = site.entries();
    entries.create("post", Fields::new()).unwrap();
    assert!(!entries.fetch("post").unwrap().contains_key("trace"));
}

#[test]
fn plugin_translations_are_available() {
    let dir = TempDir::new().unwrap();
    Site::init(dir.path()).unwrap();
    write_plugin(
        dir.path(),
        "marker",
        "name: Marker\nversion: 1.0.0\n",
        "enabled: true\n",
    );

    let lang_dir = dir
        .path()
        .join(".loam")
        .join("plugins")
        .join("marker")
        .join("lang");
    fs::create_dir_all(&lang_dir).unwrap();
    fs::write(lang_dir.join("en_US.yaml"), "marker_title: Marker\n").unwrap();

    let site = Site::builder(dir.path())
        .with_plugin(Box::new(MarkerPlugin { name: "marker" }))
        .open()
        .unwrap();

    assert_eq!(site.translate("marker_title"), Some("Marker"));
    assert_eq!(site.translate("missing"), None);
}

#[test]
fn second_open_reuses_plugin_boot_cache() {
    let dir = TempDir::new().unwrap();
    Site::init(dir.path()).unwrap();

    // Force the file driver so the boot cache survives across opens.
    fs::write(
        dir.path().join(".loam").join("settings.yaml"),
        "cache:\n  driver: file\n",
    )
    .unwrap();

    write_plugin(
        dir.path(),
        "marker",
        "name: Marker\nversion: 1.0.0\n",
        "enabled: true\n",
    );

    let open = || {
        Site::builder(dir.path())
            .with_plugin(Box::new(MarkerPlugin { name: "marker" }))
            .open()
            .unwrap()
    };

    let first = open();
    assert_eq!(first.plugins().records.len(), 1);
    drop(first);

    // With unchanged mtimes the second open reads the cached activation
    // set instead of re-parsing the plugin files.
    let second = open();
    assert_eq!(second.plugins().records.len(), 1);
    assert_eq!(second.plugins().records[0].name, "marker");
}

// =============================================================================
// Serializer and cache-key properties
// =============================================================================

proptest! {
    #[test]
    fn frontmatter_roundtrip(
        keys in proptest::collection::btree_set("[a-z][a-z0-9_]{0,8}", 0..5),
        values in proptest::collection::vec(0..3usize, 5),
        content in "[ -~]{0,40}",
    ) {
        let fm = Frontmatter::default();

        let mut fields = Fields::new();
        for (i, key) in keys.iter().enumerate() {
            let value = match values[i % values.len()] {
                0 => json!(i as i64),
                1 => json!(true),
                _ => json!(format!("value-{i}")),
            };
            fields.insert(key.clone(), value);
        }
        fields.insert("content".to_string(), json!(content.trim()));

        let encoded = fm.encode(&fields).unwrap();
        let decoded = fm.parse(&encoded).unwrap();

        prop_assert_eq!(decoded, fields);
    }

    #[test]
    fn cache_id_deterministic_and_sensitive(a in ".{0,64}", b in ".{0,64}") {
        prop_assert_eq!(cache_id("ns", &a), cache_id("ns", &a));

        if a != b {
            prop_assert_ne!(cache_id("ns", &a), cache_id("ns", &b));
        }
    }
}
