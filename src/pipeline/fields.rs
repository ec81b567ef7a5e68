//! Reserved field extensions
//!
//! Create-time defaults and fetch-time enrichment for the reserved entry
//! fields (`uuid`, `created_at`, `published_at`, `published_by`,
//! `routable`, `modified_at`) and their media counterpart. Explicitly
//! provided values are always preserved; a field extension only fills in
//! what is absent.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, TimeZone};
use serde_json::Value;

use super::context::{CreateContext, FetchResultContext, Scope};
use super::FieldExtension;

/// Unix mtime of the entry's backing file.
fn file_mtime(path: &Path) -> Result<i64> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to read mtime: {}", path.display()))?;

    let secs = modified
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    Ok(secs)
}

/// Formats the current local time with the configured date format.
fn formatted_now(format: &str) -> String {
    Local::now().format(format).to_string()
}

/// Converts a stored date string to a unix timestamp.
///
/// Returns None when the string does not round-trip through the
/// configured format; the caller then leaves the value unchanged.
fn parse_stored_date(value: &str, format: &str) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(value, format).ok()?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp())
}

/// Converts a date field to a unix timestamp on fetch, defaulting to the
/// backing file's mtime when the field is absent.
fn resolve_date_field(ctx: &mut FetchResultContext, key: &str) -> Result<()> {
    let replacement = match ctx.result.get(key) {
        None => Some(file_mtime(ctx.file_path)?),
        Some(Value::String(s)) => parse_stored_date(s, &ctx.settings.date_format),
        Some(_) => None,
    };

    if let Some(timestamp) = replacement {
        ctx.result.insert(key.to_string(), Value::from(timestamp));
    }

    Ok(())
}

/// `created_at`: formatted creation time on create, unix timestamp on fetch.
pub struct CreatedAtField;

impl FieldExtension for CreatedAtField {
    fn name(&self) -> &str {
        "created_at"
    }

    fn on_create(&self, ctx: &mut CreateContext) -> Result<()> {
        if !ctx.settings.entries.fields.created_at.enabled {
            return Ok(());
        }

        if !ctx.data.contains_key("created_at") {
            let now = formatted_now(&ctx.settings.date_format);
            ctx.data.insert("created_at".to_string(), Value::String(now));
        }

        Ok(())
    }

    fn on_fetch_result(&self, ctx: &mut FetchResultContext) -> Result<()> {
        if !ctx.settings.entries.fields.created_at.enabled {
            return Ok(());
        }

        resolve_date_field(ctx, "created_at")
    }
}

/// `published_at`: formatted publish time on create, unix timestamp on fetch.
pub struct PublishedAtField;

impl FieldExtension for PublishedAtField {
    fn name(&self) -> &str {
        "published_at"
    }

    fn on_create(&self, ctx: &mut CreateContext) -> Result<()> {
        if !ctx.settings.entries.fields.published_at.enabled {
            return Ok(());
        }

        if !ctx.data.contains_key("published_at") {
            let now = formatted_now(&ctx.settings.date_format);
            ctx.data
                .insert("published_at".to_string(), Value::String(now));
        }

        Ok(())
    }

    fn on_fetch_result(&self, ctx: &mut FetchResultContext) -> Result<()> {
        if !ctx.settings.entries.fields.published_at.enabled {
            return Ok(());
        }

        resolve_date_field(ctx, "published_at")
    }
}

/// `modified_at`: backing file mtime, injected on fetch when absent.
pub struct ModifiedAtField;

impl FieldExtension for ModifiedAtField {
    fn name(&self) -> &str {
        "modified_at"
    }

    fn on_fetch_result(&self, ctx: &mut FetchResultContext) -> Result<()> {
        if !ctx.settings.entries.fields.modified_at.enabled {
            return Ok(());
        }

        if !ctx.result.contains_key("modified_at") {
            let mtime = file_mtime(ctx.file_path)?;
            ctx.result
                .insert("modified_at".to_string(), Value::from(mtime));
        }

        Ok(())
    }
}

/// `published_by`: defaults to an empty author on create.
pub struct PublishedByField;

impl FieldExtension for PublishedByField {
    fn name(&self) -> &str {
        "published_by"
    }

    fn on_create(&self, ctx: &mut CreateContext) -> Result<()> {
        if !ctx.settings.entries.fields.published_by.enabled {
            return Ok(());
        }

        if !ctx.data.contains_key("published_by") {
            ctx.data
                .insert("published_by".to_string(), Value::String(String::new()));
        }

        Ok(())
    }
}

/// `routable`: entries are routable unless explicitly opted out.
pub struct RoutableField;

impl FieldExtension for RoutableField {
    fn name(&self) -> &str {
        "routable"
    }

    fn on_create(&self, ctx: &mut CreateContext) -> Result<()> {
        if !ctx.settings.entries.fields.routable.enabled {
            return Ok(());
        }

        if !ctx.data.contains_key("routable") {
            ctx.data.insert("routable".to_string(), Value::Bool(true));
        }

        Ok(())
    }

    fn on_fetch_result(&self, ctx: &mut FetchResultContext) -> Result<()> {
        if !ctx.settings.entries.fields.routable.enabled {
            return Ok(());
        }

        if !ctx.result.contains_key("routable") {
            ctx.result.insert("routable".to_string(), Value::Bool(true));
        }

        Ok(())
    }
}

/// `uuid`: a v4 identifier assigned on create.
pub struct UuidField;

impl FieldExtension for UuidField {
    fn name(&self) -> &str {
        "uuid"
    }

    fn on_create(&self, ctx: &mut CreateContext) -> Result<()> {
        if !ctx.settings.entries.fields.uuid.enabled {
            return Ok(());
        }

        if !ctx.data.contains_key("uuid") {
            ctx.data.insert(
                "uuid".to_string(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }

        Ok(())
    }
}

/// Media `modified_at`: media file mtime, injected on fetch when absent.
pub struct MediaModifiedAtField;

impl FieldExtension for MediaModifiedAtField {
    fn name(&self) -> &str {
        "media.modified_at"
    }

    fn scope(&self) -> Scope {
        Scope::Media
    }

    fn on_fetch_result(&self, ctx: &mut FetchResultContext) -> Result<()> {
        if !ctx.settings.media.fields.modified_at.enabled {
            return Ok(());
        }

        if !ctx.result.contains_key("modified_at") {
            let mtime = file_mtime(ctx.file_path)?;
            ctx.result
                .insert("modified_at".to_string(), Value::from(mtime));
        }

        Ok(())
    }
}
