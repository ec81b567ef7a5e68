//! Entries service
//!
//! Entries are stored as frontmatter files at
//! `.loam/entries/{id}/entry.md`; child entries nest inside their
//! parent's directory. Create runs the create pipeline before
//! persistence; fetch decodes the file (cache-eligible) and runs the
//! fetch pipeline over the in-memory record. Writes are atomic
//! (temp file + rename) but uncoordinated: last write wins.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::domain::{self, EntryId, Fields};
use crate::parsers::{EntrySource, Parsers};
use crate::pipeline::{CreateContext, FetchFieldContext, FetchResultContext, Pipeline, Scope};
use crate::storage::{CacheGateway, Frontmatter, Settings};

#[derive(Debug, Error)]
pub enum EntriesError {
    #[error("Entry '{0}' not found")]
    NotFound(String),

    #[error("Entry '{0}' already exists")]
    AlreadyExists(String),

    #[error("Target entry '{0}' already exists")]
    TargetExists(String),
}

/// Options for a single fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Extra values for `@var(...)` interpolation, overriding the
    /// entry's own `vars` mapping per key.
    pub vars: Fields,
}

/// Store and pipeline front-end for content entries.
pub struct Entries<'a> {
    dir: PathBuf,
    settings: &'a Settings,
    cache: &'a CacheGateway,
    pipeline: &'a Pipeline,
    parsers: &'a Parsers,
    frontmatter: &'a Frontmatter,
}

impl<'a> Entries<'a> {
    pub fn new(
        dir: PathBuf,
        settings: &'a Settings,
        cache: &'a CacheGateway,
        pipeline: &'a Pipeline,
        parsers: &'a Parsers,
        frontmatter: &'a Frontmatter,
    ) -> Self {
        Self {
            dir,
            settings,
            cache,
            pipeline,
            parsers,
            frontmatter,
        }
    }

    /// Returns the entries root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the backing file path of an entry.
    pub fn file_location(&self, id: &EntryId) -> PathBuf {
        self.dir.join(id.to_path()).join("entry.md")
    }

    /// Checks whether an entry exists.
    pub fn has(&self, id: &str) -> bool {
        EntryId::new(id)
            .map(|id| self.file_location(&id).exists())
            .unwrap_or(false)
    }

    /// Creates an entry, running the create pipeline before persistence.
    pub fn create(&self, id: &str, fields: Fields) -> Result<()> {
        let entry_id = EntryId::new(id)?;
        let path = self.file_location(&entry_id);

        if path.exists() {
            return Err(EntriesError::AlreadyExists(id.to_string()).into());
        }

        let mut data = fields;
        let mut ctx = CreateContext {
            id,
            data: &mut data,
            settings: self.settings,
        };
        self.pipeline.dispatch_create(Scope::Entries, &mut ctx)?;

        let text = self.frontmatter.encode(&data)?;
        self.write_file(&path, &text)?;

        debug!(id, "created entry");
        Ok(())
    }

    /// Fetches an entry, running the fetch pipeline over the record.
    pub fn fetch(&self, id: &str) -> Result<Fields> {
        self.fetch_with(id, FetchOptions::default())
    }

    /// Fetches an entry with explicit options.
    pub fn fetch_with(&self, id: &str, options: FetchOptions) -> Result<Fields> {
        let entry_id = EntryId::new(id)?;
        let path = self.file_location(&entry_id);

        if !path.exists() {
            return Err(EntriesError::NotFound(id.to_string()).into());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read entry: {}", path.display()))?;

        let mut fields = self.frontmatter.decode(&raw, self.cache)?;

        // The vars bag is the entry's own `vars` mapping overlaid with
        // fetch options, options winning.
        let mut vars = match fields.get("vars") {
            Some(Value::Object(own)) => own.clone(),
            _ => Fields::new(),
        };
        domain::merge(&mut vars, &options.vars);

        for key in domain::flatten_paths(&fields) {
            let Some(mut value) = domain::get(&fields, &key).cloned() else {
                continue;
            };

            let mut ctx = FetchFieldContext {
                id,
                key: &key,
                value: &mut value,
                vars: &vars,
                settings: self.settings,
                cache: self.cache,
                markdown: &self.parsers.markdown,
                shortcodes: &self.parsers.shortcodes,
                entries: Some(self),
            };
            self.pipeline.dispatch_fetch_field(Scope::Entries, &mut ctx)?;

            domain::set(&mut fields, &key, value);
        }

        let mut ctx = FetchResultContext {
            id,
            file_path: &path,
            result: &mut fields,
            settings: self.settings,
        };
        self.pipeline
            .dispatch_fetch_result(Scope::Entries, &mut ctx)?;

        fields.insert("id".to_string(), Value::String(id.to_string()));

        Ok(fields)
    }

    /// Merges fields into a stored entry without firing create events.
    pub fn update(&self, id: &str, fields: Fields) -> Result<()> {
        let entry_id = EntryId::new(id)?;
        let path = self.file_location(&entry_id);

        if !path.exists() {
            return Err(EntriesError::NotFound(id.to_string()).into());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read entry: {}", path.display()))?;

        let mut stored = self.frontmatter.parse(&raw)?;
        domain::merge(&mut stored, &fields);

        let text = self.frontmatter.encode(&stored)?;
        self.write_file(&path, &text)?;

        debug!(id, "updated entry");
        Ok(())
    }

    /// Deletes an entry and all of its children.
    pub fn delete(&self, id: &str) -> Result<()> {
        let entry_id = EntryId::new(id)?;
        let entry_dir = self.dir.join(entry_id.to_path());

        if !entry_dir.join("entry.md").exists() {
            return Err(EntriesError::NotFound(id.to_string()).into());
        }

        fs::remove_dir_all(&entry_dir)
            .with_context(|| format!("Failed to delete entry: {}", entry_dir.display()))?;

        debug!(id, "deleted entry");
        Ok(())
    }

    /// Renames an entry, carrying its children along.
    pub fn move_entry(&self, from: &str, to: &str) -> Result<()> {
        let from_id = EntryId::new(from)?;
        let to_id = EntryId::new(to)?;

        let from_dir = self.dir.join(from_id.to_path());
        let to_dir = self.dir.join(to_id.to_path());

        if !from_dir.join("entry.md").exists() {
            return Err(EntriesError::NotFound(from.to_string()).into());
        }

        if to_dir.exists() {
            return Err(EntriesError::TargetExists(to.to_string()).into());
        }

        if let Some(parent) = to_dir.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        fs::rename(&from_dir, &to_dir).with_context(|| {
            format!(
                "Failed to move {} to {}",
                from_dir.display(),
                to_dir.display()
            )
        })?;

        Ok(())
    }

    /// Copies an entry and all of its children.
    pub fn copy(&self, from: &str, to: &str) -> Result<()> {
        let from_id = EntryId::new(from)?;
        let to_id = EntryId::new(to)?;

        let from_dir = self.dir.join(from_id.to_path());
        let to_dir = self.dir.join(to_id.to_path());

        if !from_dir.join("entry.md").exists() {
            return Err(EntriesError::NotFound(from.to_string()).into());
        }

        if to_dir.exists() {
            return Err(EntriesError::TargetExists(to.to_string()).into());
        }

        copy_dir(&from_dir, &to_dir)?;

        Ok(())
    }

    /// Lists the ids of immediate child entries under a parent, or of
    /// top-level entries when parent is None. Sorted by id.
    pub fn list(&self, parent: Option<&str>) -> Result<Vec<String>> {
        let (base_dir, prefix) = match parent {
            Some(parent) => {
                let parent_id = EntryId::new(parent)?;
                (
                    self.dir.join(parent_id.to_path()),
                    format!("{}/", parent_id),
                )
            }
            None => (self.dir.clone(), String::new()),
        };

        if !base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();

        for dir_entry in fs::read_dir(&base_dir)
            .with_context(|| format!("Failed to read directory: {}", base_dir.display()))?
        {
            let dir_entry = dir_entry.context("Failed to read directory entry")?;
            let path = dir_entry.path();

            if path.is_dir() && path.join("entry.md").exists() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    ids.push(format!("{}{}", prefix, name));
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Writes a file atomically (temp file + rename).
    fn write_file(&self, path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = path.with_extension("md.tmp");
        fs::write(&temp_path, content)
            .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;

        fs::rename(&temp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl EntrySource for Entries<'_> {
    fn field(&self, id: &str, field: &str) -> Option<Value> {
        let fields = self.fetch(id).ok()?;
        domain::get(&fields, field).cloned()
    }
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)
        .with_context(|| format!("Failed to create directory: {}", to.display()))?;

    for entry in
        fs::read_dir(from).with_context(|| format!("Failed to read directory: {}", from.display()))?
    {
        let entry = entry.context("Failed to read directory entry")?;
        let source = entry.path();
        let target = to.join(entry.file_name());

        if source.is_dir() {
            copy_dir(&source, &target)?;
        } else {
            fs::copy(&source, &target).with_context(|| {
                format!("Failed to copy {} to {}", source.display(), target.display())
            })?;
        }
    }

    Ok(())
}
