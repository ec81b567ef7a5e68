//! Plugin translation dictionaries
//!
//! Each plugin may ship `lang/{locale}.yaml` files; the loader merges
//! them into one flat dictionary per locale, nested keys flattened to
//! dotted paths. The dictionary is cached with the plugin boot record.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-locale translation key/value store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Dictionary {
    locales: BTreeMap<String, BTreeMap<String, String>>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a YAML translation file into a locale. Later merges win
    /// per key.
    pub fn merge_yaml(&mut self, locale: &str, yaml: &str) -> Result<()> {
        if yaml.trim().is_empty() {
            self.locales.entry(locale.to_string()).or_default();
            return Ok(());
        }

        let value: Value =
            serde_yaml::from_str(yaml).context("Failed to parse translation file")?;

        let entries = self.locales.entry(locale.to_string()).or_default();

        if let Value::Object(map) = value {
            flatten(&map, None, entries);
        }

        Ok(())
    }

    /// Looks up a translation key in a locale.
    pub fn translate(&self, locale: &str, key: &str) -> Option<&str> {
        self.locales
            .get(locale)
            .and_then(|entries| entries.get(key))
            .map(String::as_str)
    }

    /// Returns the locales present in the dictionary.
    pub fn locales(&self) -> Vec<&str> {
        self.locales.keys().map(String::as_str).collect()
    }

    /// Returns all keys of a locale.
    pub fn keys(&self, locale: &str) -> Vec<&str> {
        self.locales
            .get(locale)
            .map(|entries| entries.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

fn flatten(
    map: &serde_json::Map<String, Value>,
    prefix: Option<&str>,
    out: &mut BTreeMap<String, String>,
) {
    for (key, value) in map {
        let path = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };

        match value {
            Value::Object(inner) => flatten(inner, Some(&path), out),
            Value::String(s) => {
                out.insert(path, s.clone());
            }
            other => {
                out.insert(path, other.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_and_translates() {
        let mut dictionary = Dictionary::new();
        dictionary
            .merge_yaml("en_US", "blog_title: Blog\nnested:\n  key: Value\n")
            .unwrap();

        assert_eq!(dictionary.translate("en_US", "blog_title"), Some("Blog"));
        assert_eq!(dictionary.translate("en_US", "nested.key"), Some("Value"));
        assert_eq!(dictionary.translate("de_DE", "blog_title"), None);
    }

    #[test]
    fn later_merges_win() {
        let mut dictionary = Dictionary::new();
        dictionary.merge_yaml("en_US", "title: First\n").unwrap();
        dictionary.merge_yaml("en_US", "title: Second\n").unwrap();

        assert_eq!(dictionary.translate("en_US", "title"), Some("Second"));
    }

    #[test]
    fn empty_file_registers_locale() {
        let mut dictionary = Dictionary::new();
        dictionary.merge_yaml("en_US", "   ").unwrap();

        assert_eq!(dictionary.locales(), vec!["en_US"]);
    }

    #[test]
    fn serde_roundtrip() {
        let mut dictionary = Dictionary::new();
        dictionary.merge_yaml("en_US", "title: Hello\n").unwrap();

        let json = serde_json::to_string(&dictionary).unwrap();
        let parsed: Dictionary = serde_json::from_str(&json).unwrap();

        assert_eq!(dictionary, parsed);
    }
}
