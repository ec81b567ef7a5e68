//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::storage::config::OutputFormat as ConfigFormat;
use crate::storage::{GlobalConfig, Site};
use super::output::{Output, OutputFormat};
use super::{cache_cmd, entry_cmd, media_cmd, plugin_cmd};

#[derive(Parser)]
#[command(name = "loam")]
#[command(author, version, about = "A flat-file content engine")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global config, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new loam site
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Manage content entries
    #[command(subcommand)]
    Entry(entry_cmd::EntryCommands),

    /// Manage media files
    #[command(subcommand)]
    Media(media_cmd::MediaCommands),

    /// Inspect and manage the cache
    #[command(subcommand)]
    Cache(cache_cmd::CacheCommands),

    /// Inspect plugins
    #[command(subcommand)]
    Plugin(plugin_cmd::PluginCommands),

    /// Show site status overview
    Status,
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let format = cli.format.unwrap_or_else(|| {
        let global = GlobalConfig::load().unwrap_or_default();
        match global.default_format {
            ConfigFormat::Text => OutputFormat::Text,
            ConfigFormat::Json => OutputFormat::Json,
        }
    });

    let output = Output::new(format, cli.verbose);

    if cli.verbose {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("loam_cms=debug"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }

    match cli.command {
        Commands::Init { path } => {
            output.verbose(&format!("Initializing site at: {}", path));
            let site = Site::init(&path)?;
            output.success(&format!("Initialized loam site at {}", site.root().display()));
        }

        Commands::Entry(cmd) => entry_cmd::run(cmd, &output)?,
        Commands::Media(cmd) => media_cmd::run(cmd, &output)?,
        Commands::Cache(cmd) => cache_cmd::run(cmd, &output)?,
        Commands::Plugin(cmd) => plugin_cmd::run(cmd, &output)?,

        Commands::Status => status(&output)?,
    }

    Ok(())
}

/// Counts entry files under a directory, recursively.
fn count_entries(dir: &std::path::Path) -> usize {
    let Ok(read) = std::fs::read_dir(dir) else {
        return 0;
    };

    read.flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                let own = usize::from(path.join("entry.md").exists());
                own + count_entries(&path)
            } else {
                0
            }
        })
        .sum()
}

fn status(output: &Output) -> Result<()> {
    let site = Site::open_current()?;

    let entries = count_entries(&site.loam_dir().join("entries"));
    let media = site.media().list()?.len();
    let plugins = site.plugins().records.len();
    let driver = site.cache().driver_name();

    if output.is_json() {
        output.data(&serde_json::json!({
            "root": site.root().display().to_string(),
            "entries": entries,
            "media": media,
            "plugins": plugins,
            "cache_driver": driver,
        }));
    } else {
        println!("Site: {}", site.root().display());
        println!("Entries: {}", entries);
        println!("Media: {}", media);
        println!("Plugins: {}", plugins);
        println!("Cache driver: {}", driver);
    }

    Ok(())
}
