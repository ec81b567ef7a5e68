//! # Storage Layer
//!
//! Persistence and configuration for Loam.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Entries | Markdown + frontmatter header | `.loam/entries/{id}/entry.md` |
//! | Media meta | YAML sidecar | `.loam/media/.meta/{id}.yaml` |
//! | Settings | YAML | `.loam/settings.yaml` |
//! | Plugins | YAML manifest + settings | `.loam/plugins/{name}/` |
//! | Cache | driver-dependent | `.loam/cache/` |
//!
//! ## Concurrency
//!
//! Writes are atomic (temp file + rename) but deliberately uncoordinated:
//! concurrent writers to the same entry or cache key follow last-write-wins.
//!
//! ## Key Types
//!
//! - [`Site`] - Entry point for accessing a Loam site
//! - [`Frontmatter`] - Encode/decode frontmatter documents
//! - [`CacheGateway`] - Key/value cache with selectable drivers
//! - [`Settings`] - Site configuration

pub mod cache;
pub mod config;
pub mod frontmatter;
mod site;

pub use cache::{cache_id, CacheError, CacheGateway};
pub use config::{ConfigError, GlobalConfig, Settings};
pub use frontmatter::{Frontmatter, FrontmatterError, HeaderFormat};
pub use site::{Site, SiteBuilder, SiteError};
