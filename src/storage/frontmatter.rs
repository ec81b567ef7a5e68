//! Frontmatter serialization
//!
//! A stored document is a header in a structured sub-format between `---`
//! delimiter lines, followed by a free-text body:
//!
//! ```text
//! ---
//! title: Hello
//! ---
//! Body content.
//! ```
//!
//! Encoding folds a `content` key into the body; decoding merges the body
//! back as `content`. Decode results are cache-eligible under a key derived
//! from the raw input text, so repeated fetches of an unchanged file skip
//! parsing entirely.

use anyhow::{Context, Result};
use serde_json::Value;
use thiserror::Error;

use crate::domain::Fields;
use super::cache::{cache_id, CacheGateway};
use super::config::FrontmatterSettings;

#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("Failed to encode frontmatter header: {0}")]
    Encode(String),

    #[error("Failed to decode frontmatter header: {0}")]
    Decode(String),
}

/// Header sub-format for the frontmatter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFormat {
    Yaml,
    Json,
    Toml,
}

impl HeaderFormat {
    /// Resolves a configured format name.
    ///
    /// Unknown names fall back to yaml, as does "frontmatter" itself,
    /// which would otherwise recurse.
    pub fn resolve(name: &str) -> Self {
        match name {
            "json" => HeaderFormat::Json,
            "toml" => HeaderFormat::Toml,
            _ => HeaderFormat::Yaml,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HeaderFormat::Yaml => "yaml",
            HeaderFormat::Json => "json",
            HeaderFormat::Toml => "toml",
        }
    }
}

/// Frontmatter serializer.
pub struct Frontmatter {
    header: HeaderFormat,
    cache_enabled: bool,
}

impl Frontmatter {
    pub fn new(settings: &FrontmatterSettings) -> Self {
        Self {
            header: HeaderFormat::resolve(&settings.header),
            cache_enabled: settings.cache,
        }
    }

    /// Returns the cache key for a raw document.
    pub fn cache_key(input: &str) -> String {
        cache_id("frontmatter", input)
    }

    /// Encodes a record into a frontmatter document.
    ///
    /// A `content` key becomes the document body and is excluded from the
    /// header; without one the body is empty.
    pub fn encode(&self, record: &Fields) -> Result<String> {
        let mut header = record.clone();
        let content = match header.remove("content") {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => String::new(),
        };

        let matter = self.encode_header(&header)?;

        Ok(format!("---\n{}---\n{}", matter, content))
    }

    /// Decodes a frontmatter document into a record, consulting the cache.
    pub fn decode(&self, input: &str, cache: &CacheGateway) -> Result<Fields> {
        if !self.cache_enabled {
            return self.parse(input);
        }

        let key = Self::cache_key(input);

        if let Some(Value::Object(cached)) = cache.get(&key) {
            return Ok(cached);
        }

        let record = self.parse(input)?;
        cache.set(&key, Value::Object(record.clone()));

        Ok(record)
    }

    /// Decodes without consulting the cache.
    pub fn parse(&self, input: &str) -> Result<Fields> {
        // Strip a UTF-8 BOM and normalize line endings.
        let input = input.trim_start_matches('\u{feff}');
        let normalized = input.replace("\r\n", "\n").replace('\r', "\n");

        let segments = split_on_delimiters(normalized.trim_start());

        if segments.len() < 3 {
            let mut record = Fields::new();
            record.insert(
                "content".to_string(),
                Value::String(normalized.trim().to_string()),
            );
            return Ok(record);
        }

        let mut record = self.decode_header(segments[1].trim())?;
        let body = segments[2..].join("\n---\n");
        record.insert(
            "content".to_string(),
            Value::String(body.trim().to_string()),
        );

        Ok(record)
    }

    fn encode_header(&self, header: &Fields) -> Result<String> {
        let text = match self.header {
            HeaderFormat::Yaml => serde_yaml::to_string(header)
                .map_err(|e| FrontmatterError::Encode(e.to_string()))?,
            HeaderFormat::Json => {
                let mut text = serde_json::to_string_pretty(header)
                    .map_err(|e| FrontmatterError::Encode(e.to_string()))?;
                text.push('\n');
                text
            }
            HeaderFormat::Toml => {
                toml::to_string(header).map_err(|e| FrontmatterError::Encode(e.to_string()))?
            }
        };

        Ok(text)
    }

    fn decode_header(&self, header: &str) -> Result<Fields> {
        if header.is_empty() {
            return Ok(Fields::new());
        }

        let value: Value = match self.header {
            HeaderFormat::Yaml => serde_yaml::from_str(header)
                .map_err(|e| FrontmatterError::Decode(e.to_string()))?,
            HeaderFormat::Json => serde_json::from_str(header)
                .map_err(|e| FrontmatterError::Decode(e.to_string()))?,
            HeaderFormat::Toml => {
                toml::from_str(header).map_err(|e| FrontmatterError::Decode(e.to_string()))?
            }
        };

        match value {
            Value::Object(fields) => Ok(fields),
            Value::Null => Ok(Fields::new()),
            other => Err(FrontmatterError::Decode(format!(
                "header is not a mapping: {}",
                other
            )))
            .context("Failed to decode frontmatter"),
        }
    }
}

impl Default for Frontmatter {
    fn default() -> Self {
        Self::new(&FrontmatterSettings::default())
    }
}

/// Splits a document on lines consisting solely of `---`.
fn split_on_delimiters(input: &str) -> Vec<String> {
    let mut segments = vec![String::new()];

    for line in input.split('\n') {
        if line.trim() == "---" {
            segments.push(String::new());
        } else {
            let current = segments.last_mut().unwrap();
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }

    segments
}
