//! Entry identifiers
//!
//! An entry id is a slash-separated path relative to the entries root,
//! e.g. `blog/hello-world`. Ids map directly onto storage directories,
//! so path traversal segments and absolute paths are rejected.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Entry id cannot be empty")]
    Empty,

    #[error("Invalid entry id '{0}': absolute paths are not allowed")]
    Absolute(String),

    #[error("Invalid entry id '{0}': path traversal segments are not allowed")]
    Traversal(String),

    #[error("Invalid entry id '{0}': empty path segment")]
    EmptySegment(String),
}

/// Identifier of a stored entry, a normalized slash-separated path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryId {
    path: String,
}

impl EntryId {
    /// Parses and validates an entry id.
    pub fn new(id: impl AsRef<str>) -> Result<Self, IdError> {
        id.as_ref().parse()
    }

    /// Returns the id as a slash-separated path string.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Returns the path segments of the id.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/')
    }

    /// Returns the parent id, or None for a top-level entry.
    pub fn parent(&self) -> Option<EntryId> {
        self.path.rsplit_once('/').map(|(parent, _)| EntryId {
            path: parent.to_string(),
        })
    }

    /// Returns the final path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Returns the id as a relative filesystem path.
    pub fn to_path(&self) -> PathBuf {
        self.segments().collect()
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl FromStr for EntryId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches('/');

        if trimmed.is_empty() {
            return Err(IdError::Empty);
        }

        if trimmed.starts_with('/') || trimmed.starts_with('\\') {
            return Err(IdError::Absolute(s.to_string()));
        }

        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(IdError::EmptySegment(s.to_string()));
            }

            if segment == "." || segment == ".." {
                return Err(IdError::Traversal(s.to_string()));
            }
        }

        Ok(Self {
            path: trimmed.to_string(),
        })
    }
}

impl TryFrom<String> for EntryId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntryId> for String {
    fn from(id: EntryId) -> Self {
        id.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_id_parses() {
        let id: EntryId = "foo".parse().unwrap();
        assert_eq!(id.as_str(), "foo");
        assert_eq!(id.name(), "foo");
        assert!(id.parent().is_none());
    }

    #[test]
    fn nested_id_parses() {
        let id: EntryId = "blog/hello-world".parse().unwrap();
        assert_eq!(id.name(), "hello-world");
        assert_eq!(id.parent().unwrap().as_str(), "blog");
        assert_eq!(id.to_path(), PathBuf::from("blog/hello-world"));
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let id: EntryId = "blog/".parse().unwrap();
        assert_eq!(id.as_str(), "blog");
    }

    #[test]
    fn rejects_invalid_ids() {
        assert_eq!("".parse::<EntryId>(), Err(IdError::Empty));
        assert!(matches!("/abs".parse::<EntryId>(), Err(IdError::Absolute(_))));
        assert!(matches!(
            "a/../b".parse::<EntryId>(),
            Err(IdError::Traversal(_))
        ));
        assert!(matches!(
            "a//b".parse::<EntryId>(),
            Err(IdError::EmptySegment(_))
        ));
    }

    #[test]
    fn serde_roundtrip() {
        let id: EntryId = "blog/post".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: EntryId = serde_json::from_str(&json).unwrap();

        assert_eq!(id, parsed);
    }
}
