//! # Content Services
//!
//! The entries and media services: file-backed content units whose
//! create/fetch operations run the directive/field pipeline. Fetch-time
//! mutations are ephemeral; only create/update/delete touch disk.

mod entries;
mod media;

pub use entries::{Entries, EntriesError, FetchOptions};
pub use media::{Media, MediaError};
