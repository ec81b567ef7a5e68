//! Entry CLI commands

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::Value;

use crate::content::FetchOptions;
use crate::domain::{self, Fields};
use crate::storage::Site;
use super::output::Output;

#[derive(Subcommand)]
pub enum EntryCommands {
    /// Create an entry
    Create {
        /// Entry id (slash-separated path)
        id: String,

        /// Field assignment, key=value (repeatable; dotted keys allowed)
        #[arg(long = "set", short = 's', value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Fields as a JSON object, merged after --set
        #[arg(long)]
        data: Option<String>,
    },

    /// Fetch an entry
    Fetch {
        /// Entry id
        id: String,

        /// Var for @var(...) interpolation, key=value (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },

    /// Merge fields into an existing entry
    Update {
        /// Entry id
        id: String,

        /// Field assignment, key=value (repeatable; dotted keys allowed)
        #[arg(long = "set", short = 's', value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Delete an entry and its children
    Delete {
        /// Entry id
        id: String,
    },

    /// List child entries
    List {
        /// Parent entry id (defaults to top level)
        parent: Option<String>,
    },

    /// Rename an entry, carrying children along
    Move {
        /// Current entry id
        from: String,

        /// New entry id
        to: String,
    },

    /// Copy an entry and its children
    Copy {
        /// Source entry id
        from: String,

        /// Target entry id
        to: String,
    },
}

pub fn run(cmd: EntryCommands, output: &Output) -> Result<()> {
    let site = Site::open_current()?;
    let entries = site.entries();

    match cmd {
        EntryCommands::Create { id, set, data } => {
            let mut fields = parse_assignments(&set)?;

            if let Some(data) = data {
                let extra: Fields = serde_json::from_str(&data)
                    .context("Failed to parse --data as a JSON object")?;
                domain::merge(&mut fields, &extra);
            }

            entries.create(&id, fields)?;
            output.success(&format!("Created entry '{}'", id));
        }

        EntryCommands::Fetch { id, vars } => {
            let options = FetchOptions {
                vars: parse_assignments(&vars)?,
            };

            let fields = entries.fetch_with(&id, options)?;
            output.data(&fields);
        }

        EntryCommands::Update { id, set } => {
            let fields = parse_assignments(&set)?;
            entries.update(&id, fields)?;
            output.success(&format!("Updated entry '{}'", id));
        }

        EntryCommands::Delete { id } => {
            entries.delete(&id)?;
            output.success(&format!("Deleted entry '{}'", id));
        }

        EntryCommands::List { parent } => {
            let ids = entries.list(parent.as_deref())?;

            if output.is_json() {
                output.data(&ids);
            } else {
                for id in ids {
                    output.row(&[&id]);
                }
            }
        }

        EntryCommands::Move { from, to } => {
            entries.move_entry(&from, &to)?;
            output.success(&format!("Moved entry '{}' to '{}'", from, to));
        }

        EntryCommands::Copy { from, to } => {
            entries.copy(&from, &to)?;
            output.success(&format!("Copied entry '{}' to '{}'", from, to));
        }
    }

    Ok(())
}

/// Parses repeated `key=value` flags into a field map.
///
/// Values that parse as JSON become typed values; everything else stays a
/// string. Dotted keys create nested objects.
pub fn parse_assignments(assignments: &[String]) -> Result<Fields> {
    let mut fields = Fields::new();

    for assignment in assignments {
        let (key, value) = assignment
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got '{}'", assignment))?;

        let value = match serde_json::from_str::<Value>(value) {
            Ok(parsed) => parsed,
            Err(_) => Value::String(value.to_string()),
        };

        domain::set(&mut fields, key, value);
    }

    Ok(fields)
}
