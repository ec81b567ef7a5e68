//! Plugin CLI commands

use anyhow::Result;
use clap::Subcommand;

use crate::storage::Site;
use super::output::Output;

#[derive(Subcommand)]
pub enum PluginCommands {
    /// List activated plugins in activation order
    List,
}

pub fn run(cmd: PluginCommands, output: &Output) -> Result<()> {
    match cmd {
        PluginCommands::List => list(output),
    }
}

fn list(output: &Output) -> Result<()> {
    let site = Site::open_current()?;
    let records = &site.plugins().records;

    if output.is_json() {
        let items: Vec<_> = records
            .iter()
            .map(|record| {
                serde_json::json!({
                    "name": record.name,
                    "version": record.manifest.version.to_string(),
                    "priority": record.settings.priority,
                    "description": record.manifest.description,
                })
            })
            .collect();

        output.data(&items);
    } else if records.is_empty() {
        output.success("No plugins activated");
    } else {
        output.row(&["NAME", "VERSION", "PRIORITY", "DESCRIPTION"]);
        for record in records {
            output.row(&[
                &record.name,
                &record.manifest.version.to_string(),
                &record.settings.priority.to_string(),
                &record.manifest.description,
            ]);
        }
    }

    Ok(())
}
