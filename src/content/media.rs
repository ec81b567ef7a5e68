//! Media service
//!
//! Media entries are uploaded files under `.loam/media/` with a YAML meta
//! sidecar under `.loam/media/.meta/{id}.yaml`. Fetch decodes the sidecar
//! and runs the media pipeline events over it, mirroring the entries
//! fetch flow.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::domain::{self, EntryId, Fields};
use crate::parsers::Parsers;
use crate::pipeline::{CreateContext, FetchFieldContext, FetchResultContext, Pipeline, Scope};
use crate::storage::{CacheGateway, Settings};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Media file '{0}' not found")]
    NotFound(String),

    #[error("Media file '{0}' already exists")]
    AlreadyExists(String),

    #[error("Source file '{0}' does not exist")]
    MissingSource(PathBuf),
}

/// Store and pipeline front-end for media files.
pub struct Media<'a> {
    dir: PathBuf,
    settings: &'a Settings,
    cache: &'a CacheGateway,
    pipeline: &'a Pipeline,
    parsers: &'a Parsers,
}

impl<'a> Media<'a> {
    pub fn new(
        dir: PathBuf,
        settings: &'a Settings,
        cache: &'a CacheGateway,
        pipeline: &'a Pipeline,
        parsers: &'a Parsers,
    ) -> Self {
        Self {
            dir,
            settings,
            cache,
            pipeline,
            parsers,
        }
    }

    /// Returns the media root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the stored file path of a media id.
    pub fn file_location(&self, id: &EntryId) -> PathBuf {
        self.dir.join(id.to_path())
    }

    /// Returns the meta sidecar path of a media id.
    pub fn meta_location(&self, id: &EntryId) -> PathBuf {
        let mut path = self.dir.join(".meta").join(id.to_path());
        let file_name = path
            .file_name()
            .map(|n| format!("{}.yaml", n.to_string_lossy()))
            .unwrap_or_else(|| "meta.yaml".to_string());
        path.set_file_name(file_name);
        path
    }

    /// Checks whether a media file exists.
    pub fn has(&self, id: &str) -> bool {
        EntryId::new(id)
            .map(|id| self.file_location(&id).exists())
            .unwrap_or(false)
    }

    /// Registers a file: copies it into the media root and writes its
    /// meta sidecar, running the media create pipeline first.
    pub fn register(&self, source: &Path, id: &str, meta: Fields) -> Result<()> {
        let media_id = EntryId::new(id)?;
        let target = self.file_location(&media_id);

        if !source.exists() {
            return Err(MediaError::MissingSource(source.to_path_buf()).into());
        }

        if target.exists() {
            return Err(MediaError::AlreadyExists(id.to_string()).into());
        }

        let mut data = meta;
        let mut ctx = CreateContext {
            id,
            data: &mut data,
            settings: self.settings,
        };
        self.pipeline.dispatch_create(Scope::Media, &mut ctx)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        fs::copy(source, &target).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                source.display(),
                target.display()
            )
        })?;

        self.write_meta(&media_id, &data)?;

        debug!(id, "registered media file");
        Ok(())
    }

    /// Fetches a media record, running the media pipeline over its meta.
    pub fn fetch(&self, id: &str) -> Result<Fields> {
        let media_id = EntryId::new(id)?;
        let file_path = self.file_location(&media_id);

        if !file_path.exists() {
            return Err(MediaError::NotFound(id.to_string()).into());
        }

        let meta_path = self.meta_location(&media_id);
        let mut fields = if meta_path.exists() {
            let raw = fs::read_to_string(&meta_path)
                .with_context(|| format!("Failed to read meta: {}", meta_path.display()))?;

            if raw.trim().is_empty() {
                Fields::new()
            } else {
                let value: Value = serde_yaml::from_str(&raw)
                    .with_context(|| format!("Failed to parse meta: {}", meta_path.display()))?;
                match value {
                    Value::Object(fields) => fields,
                    _ => Fields::new(),
                }
            }
        } else {
            Fields::new()
        };

        let vars = Fields::new();

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
                entries: None,
            };
            self.pipeline.dispatch_fetch_field(Scope::Media, &mut ctx)?;

            domain::set(&mut fields, &key, value);
        }

        let mut ctx = FetchResultContext {
            id,
            file_path: &file_path,
            result: &mut fields,
            settings: self.settings,
        };
        self.pipeline.dispatch_fetch_result(Scope::Media, &mut ctx)?;

        fields.insert("id".to_string(), Value::String(id.to_string()));

        Ok(fields)
    }

    /// Merges fields into a media file's meta sidecar.
    pub fn update(&self, id: &str, meta: Fields) -> Result<()> {
        let media_id = EntryId::new(id)?;

        if !self.file_location(&media_id).exists() {
            return Err(MediaError::NotFound(id.to_string()).into());
        }

        let meta_path = self.meta_location(&media_id);
        let mut stored = if meta_path.exists() {
            let raw = fs::read_to_string(&meta_path)
                .with_context(|| format!("Failed to read meta: {}", meta_path.display()))?;
            serde_yaml::from_str::<Value>(&raw)
                .ok()
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default()
        } else {
            Fields::new()
        };

        domain::merge(&mut stored, &meta);
        self.write_meta(&media_id, &stored)?;

        Ok(())
    }

    /// Deletes a media file and its meta sidecar.
    pub fn delete(&self, id: &str) -> Result<()> {
        let media_id = EntryId::new(id)?;
        let file_path = self.file_location(&media_id);

        if !file_path.exists() {
            return Err(MediaError::NotFound(id.to_string()).into());
        }

        fs::remove_file(&file_path)
            .with_context(|| format!("Failed to delete media file: {}", file_path.display()))?;

        let meta_path = self.meta_location(&media_id);
        if meta_path.exists() {
            fs::remove_file(&meta_path).with_context(|| {
                format!("Failed to delete media meta: {}", meta_path.display())
            })?;
        }

        debug!(id, "deleted media file");
        Ok(())
    }

    /// Lists media ids, sorted. Meta sidecars are excluded.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        collect_files(&self.dir, &self.dir, &mut ids)?;
        ids.sort();

        Ok(ids)
    }

    fn write_meta(&self, id: &EntryId, meta: &Fields) -> Result<()> {
        let meta_path = self.meta_location(id);

        if let Some(parent) = meta_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = serde_yaml::to_string(meta).context("Failed to serialize media meta")?;

        fs::write(&meta_path, content)
            .with_context(|| format!("Failed to write meta: {}", meta_path.display()))
    }
}

fn collect_files(root: &Path, dir: &Path, ids: &mut Vec<String>) -> Result<()> {
    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry = entry.context("Failed to read directory entry")?;
        let path = entry.path();

        if path.is_dir() {
            if entry.file_name() == ".meta" {
                continue;
            }
            collect_files(root, &path, ids)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            ids.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::{Markdown, Shortcodes};
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        settings: Settings,
        cache: CacheGateway,
        pipeline: Pipeline,
        parsers: Parsers,
    }

    impl Fixture {
        fn new() -> Self {
            let settings = Settings::default();
            let parsers = Parsers::new(
                Markdown::new(&settings.parsers.markdown),
                Shortcodes::with_builtins(&settings.parsers.shortcodes),
            );

            Self {
                dir: TempDir::new().unwrap(),
                settings,
                cache: CacheGateway::memory(),
                pipeline: Pipeline::with_builtins(),
                parsers,
            }
        }

        fn media(&self) -> Media<'_> {
            Media::new(
                self.dir.path().join("media"),
                &self.settings,
                &self.cache,
                &self.pipeline,
                &self.parsers,
            )
        }

        fn source_file(&self, name: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            fs::write(&path, content).unwrap();
            path
        }
    }

    fn record(value: serde_json::Value) -> Fields {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn register_and_fetch() {
        let fixture = Fixture::new();
        let media = fixture.media();
        let source = fixture.source_file("photo.jpg", "jpeg-bytes");

        media
            .register(&source, "uploads/photo.jpg", record(json!({"title": "Photo"})))
            .unwrap();

        assert!(media.has("uploads/photo.jpg"));

        let fetched = media.fetch("uploads/photo.jpg").unwrap();
        assert_eq!(fetched.get("title"), Some(&json!("Photo")));
        assert_eq!(fetched.get("id"), Some(&json!("uploads/photo.jpg")));
    }

    #[test]
    fn fetch_injects_modified_at_from_file_mtime() {
        let fixture = Fixture::new();
        let media = fixture.media();
        let source = fixture.source_file("photo.jpg", "jpeg-bytes");

        media.register(&source, "photo.jpg", Fields::new()).unwrap();

        let fetched = media.fetch("photo.jpg").unwrap();
        assert!(fetched.get("modified_at").unwrap().as_i64().unwrap() > 0);
    }

    #[test]
    fn explicit_modified_at_is_preserved() {
        let fixture = Fixture::new();
        let media = fixture.media();
        let source = fixture.source_file("photo.jpg", "jpeg-bytes");

        media
            .register(&source, "photo.jpg", record(json!({"modified_at": 42})))
            .unwrap();

        let fetched = media.fetch("photo.jpg").unwrap();
        assert_eq!(fetched.get("modified_at"), Some(&json!(42)));
    }

    #[test]
    fn entry_fields_do_not_leak_into_media() {
        let fixture = Fixture::new();
        let media = fixture.media();
        let source = fixture.source_file("photo.jpg", "jpeg-bytes");

        media.register(&source, "photo.jpg", Fields::new()).unwrap();

        // Entries-scoped extensions (uuid, routable, ...) must not fire.
        let fetched = media.fetch("photo.jpg").unwrap();
        assert!(!fetched.contains_key("uuid"));
        assert!(!fetched.contains_key("routable"));
    }

    #[test]
    fn update_merges_meta() {
        let fixture = Fixture::new();
        let media = fixture.media();
        let source = fixture.source_file("photo.jpg", "jpeg-bytes");

        media
            .register(&source, "photo.jpg", record(json!({"title": "Old"})))
            .unwrap();
        media
            .update("photo.jpg", record(json!({"title": "New", "alt": "text"})))
            .unwrap();

        let fetched = media.fetch("photo.jpg").unwrap();
        assert_eq!(fetched.get("title"), Some(&json!("New")));
        assert_eq!(fetched.get("alt"), Some(&json!("text")));
    }

    #[test]
    fn delete_removes_file_and_sidecar() {
        let fixture = Fixture::new();
        let media = fixture.media();
        let source = fixture.source_file("photo.jpg", "jpeg-bytes");

        media
            .register(&source, "photo.jpg", record(json!({"title": "Photo"})))
            .unwrap();
        media.delete("photo.jpg").unwrap();

        assert!(!media.has("photo.jpg"));
        assert!(!media
            .meta_location(&EntryId::new("photo.jpg").unwrap())
            .exists());
    }

    #[test]
    fn list_excludes_meta_sidecars() {
        let fixture = Fixture::new();
        let media = fixture.media();
        let source = fixture.source_file("photo.jpg", "jpeg-bytes");

        media
            .register(&source, "b/photo.jpg", record(json!({"title": "B"})))
            .unwrap();
        media.register(&source, "a.jpg", Fields::new()).unwrap();

        assert_eq!(media.list().unwrap(), vec!["a.jpg", "b/photo.jpg"]);
    }

    #[test]
    fn register_duplicate_fails() {
        let fixture = Fixture::new();
        let media = fixture.media();
        let source = fixture.source_file("photo.jpg", "jpeg-bytes");

        media.register(&source, "photo.jpg", Fields::new()).unwrap();
        assert!(media.register(&source, "photo.jpg", Fields::new()).is_err());
    }
}
