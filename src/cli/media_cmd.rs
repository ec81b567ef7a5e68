//! Media CLI commands

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use crate::storage::Site;
use super::entry_cmd::parse_assignments;
use super::output::Output;

#[derive(Subcommand)]
pub enum MediaCommands {
    /// Register a file as a media entry
    Add {
        /// Source file to copy into the media root
        source: PathBuf,

        /// Media id (slash-separated path including the file name)
        id: String,

        /// Meta field, key=value (repeatable)
        #[arg(long = "set", short = 's', value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Fetch a media record
    Fetch {
        /// Media id
        id: String,
    },

    /// Merge fields into a media file's meta
    Update {
        /// Media id
        id: String,

        /// Meta field, key=value (repeatable)
        #[arg(long = "set", short = 's', value_name = "KEY=VALUE")]
        set: Vec<String>,
    },

    /// Delete a media file and its meta
    Delete {
        /// Media id
        id: String,
    },

    /// List media files
    List,
}

pub fn run(cmd: MediaCommands, output: &Output) -> Result<()> {
    let site = Site::open_current()?;
    let media = site.media();

    match cmd {
        MediaCommands::Add { source, id, set } => {
            let meta = parse_assignments(&set)?;
            media.register(&source, &id, meta)?;
            output.success(&format!("Registered media '{}'", id));
        }

        MediaCommands::Fetch { id } => {
            let fields = media.fetch(&id)?;
            output.data(&fields);
        }

        MediaCommands::Update { id, set } => {
            let meta = parse_assignments(&set)?;
            media.update(&id, meta)?;
            output.success(&format!("Updated media '{}'", id));
        }

        MediaCommands::Delete { id } => {
            media.delete(&id)?;
            output.success(&format!("Deleted media '{}'", id));
        }

        MediaCommands::List => {
            let ids = media.list()?;

            if output.is_json() {
                output.data(&ids);
            } else {
                for id in ids {
                    output.row(&[&id]);
                }
            }
        }
    }

    Ok(())
}
