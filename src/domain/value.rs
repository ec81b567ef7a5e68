//! Dotted-path field access
//!
//! Entry records are plain JSON maps. Pipeline extensions and directives
//! address nested values by dotted key paths (`seo.description`), so the
//! helpers here implement get/set/has/remove over those paths, a recursive
//! merge for settings overlays, and leaf-path flattening for per-field
//! event dispatch.

use serde_json::Value;

/// An entry record: field name to value.
pub type Fields = serde_json::Map<String, Value>;

/// Looks up a value by dotted path.
pub fn get<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut current = fields;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let value = current.get(segment)?;

        if segments.peek().is_none() {
            return Some(value);
        }

        current = value.as_object()?;
    }

    None
}

/// Returns true if a value exists at the dotted path.
pub fn has(fields: &Fields, path: &str) -> bool {
    get(fields, path).is_some()
}

/// Sets a value at a dotted path, creating intermediate objects.
///
/// A non-object value in the middle of the path is replaced by an object.
pub fn set(fields: &mut Fields, path: &str, value: Value) {
    let mut current = fields;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }

        let next = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Fields::new()));

        if !next.is_object() {
            *next = Value::Object(Fields::new());
        }

        current = next.as_object_mut().unwrap();
    }
}

/// Removes and returns the value at a dotted path.
pub fn remove(fields: &mut Fields, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => fields.remove(path),
        Some((head, rest)) => {
            let inner = fields.get_mut(head)?.as_object_mut()?;
            remove(inner, rest)
        }
    }
}

/// Recursively merges `overlay` into `base`.
///
/// Objects merge per key; any other overlay value replaces the base value.
pub fn merge(base: &mut Fields, overlay: &Fields) {
    for (key, value) in overlay {
        match (base.get_mut(key), value.as_object()) {
            (Some(Value::Object(existing)), Some(incoming)) => merge(existing, incoming),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Returns the dotted paths of all leaf values, in key order.
///
/// Arrays count as leaves; only objects are descended into.
pub fn flatten_paths(fields: &Fields) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths(fields, None, &mut paths);
    paths
}

fn collect_paths(fields: &Fields, prefix: Option<&str>, paths: &mut Vec<String>) {
    for (key, value) in fields {
        let path = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };

        match value {
            Value::Object(inner) if !inner.is_empty() => {
                collect_paths(inner, Some(&path), paths);
            }
            _ => paths.push(path),
        }
    }
}
