//! Cache CLI commands

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::Value;

use crate::storage::Site;
use super::output::Output;

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Check whether a key is cached
    Has {
        /// Cache key
        key: String,
    },

    /// Print a cached value
    Get {
        /// Cache key
        key: String,
    },

    /// Store a value (parsed as JSON, falling back to a string)
    Set {
        /// Cache key
        key: String,

        /// Value to store
        value: String,
    },

    /// Delete a cached value
    Delete {
        /// Cache key
        key: String,
    },

    /// Clear the whole cache
    Clear,
}

pub fn run(cmd: CacheCommands, output: &Output) -> Result<()> {
    let site = Site::open_current()?;
    let cache = site.cache();

    match cmd {
        CacheCommands::Has { key } => {
            let found = cache.has(&key);

            if output.is_json() {
                output.data(&serde_json::json!({ "key": key, "found": found }));
            } else if found {
                output.success(&format!("Cache key '{}' found", key));
            } else {
                output.success(&format!("Cache key '{}' not found", key));
            }
        }

        CacheCommands::Get { key } => {
            let value = cache
                .get(&key)
                .with_context(|| format!("Cache key '{}' not found", key))?;
            output.data(&value);
        }

        CacheCommands::Set { key, value } => {
            let value = match serde_json::from_str::<Value>(&value) {
                Ok(parsed) => parsed,
                Err(_) => Value::String(value),
            };

            if cache.set(&key, value) {
                output.success(&format!("Cached '{}'", key));
            } else {
                output.error(&format!("Failed to cache '{}'", key));
            }
        }

        CacheCommands::Delete { key } => {
            if cache.delete(&key) {
                output.success(&format!("Deleted cache key '{}'", key));
            } else {
                output.success(&format!("Cache key '{}' not found", key));
            }
        }

        CacheCommands::Clear => {
            if cache.clear() {
                output.success("Cache cleared");
            } else {
                output.error("Failed to clear cache");
            }
        }
    }

    Ok(())
}
