//! Pipeline event payloads
//!
//! One concrete context struct per lifecycle event. A context is owned by
//! the pipeline invocation that builds it and discarded afterwards;
//! mutations made during fetch are never persisted back to disk.

use std::path::Path;

use serde_json::Value;

use crate::domain::Fields;
use crate::parsers::{EntrySource, Markdown, ShortcodeContext, Shortcodes};
use crate::storage::{CacheGateway, Settings};

/// Collection a pipeline event belongs to.
///
/// An extension instance processes only the collection it was registered
/// for, so same-named fields in different collections never double-fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Entries,
    Media,
}

/// Payload of the create event, fired once per create before persistence.
pub struct CreateContext<'a> {
    /// Id of the entry being created.
    pub id: &'a str,

    /// Fields about to be persisted. Extensions inject defaults here.
    pub data: &'a mut Fields,

    pub settings: &'a Settings,
}

/// Payload of the fetch-field event, fired once per leaf field.
pub struct FetchFieldContext<'a> {
    /// Id of the entry being fetched.
    pub id: &'a str,

    /// Dotted path of the current field.
    pub key: &'a str,

    /// Current field value; directives rewrite it in place.
    pub value: &'a mut Value,

    /// Per-fetch vars bag for `@var(...)` interpolation.
    pub vars: &'a Fields,

    pub settings: &'a Settings,
    pub cache: &'a CacheGateway,
    pub markdown: &'a Markdown,
    pub shortcodes: &'a Shortcodes,
    pub entries: Option<&'a dyn EntrySource>,
}

impl<'a> FetchFieldContext<'a> {
    /// Builds the context handed to shortcode handlers.
    pub fn shortcode_context(&self) -> ShortcodeContext<'a> {
        ShortcodeContext {
            settings: self.settings,
            cache: self.cache,
            markdown: self.markdown,
            entries: self.entries,
        }
    }
}

/// Payload of the fetch-result event, fired after all fields resolved.
pub struct FetchResultContext<'a> {
    /// Id of the fetched entry.
    pub id: &'a str,

    /// Backing file of the entry, for mtime-derived fields.
    pub file_path: &'a Path,

    /// The fully resolved record; extensions enrich it in place.
    pub result: &'a mut Fields,

    pub settings: &'a Settings,
}
