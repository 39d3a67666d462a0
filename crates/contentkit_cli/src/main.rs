//! ContentKit CLI
//!
//! Command-line tools for the ContentKit response cache.
//!
//! # Commands
//!
//! - `sweep` - Remove records older than a horizon
//! - `inspect` - List cached records
//! - `hash` - Compute the content key of a request

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ContentKit cache tools.
#[derive(Parser)]
#[command(name = "contentkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the cache directory
    #[arg(global = true, short, long)]
    cache_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove cached records older than a horizon
    Sweep {
        /// Age in hours beyond which records are removed
        #[arg(long, default_value = "24")]
        horizon_hours: u64,

        /// Dry run - list what would be removed
        #[arg(short, long)]
        dry_run: bool,
    },

    /// List cached records
    Inspect {
        /// Only show records for this content type
        #[arg(long)]
        class_uid: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Compute the content key of a request
    Hash {
        /// Fully resolved request URL
        url: String,

        /// Request parameter as key=value (value parsed as JSON when possible)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Request header as name=value
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Sweep {
            horizon_hours,
            dry_run,
        } => {
            let dir = cli.cache_dir.ok_or("Cache directory required for sweep")?;
            commands::sweep::run(&dir, horizon_hours, dry_run)?;
        }
        Commands::Inspect { class_uid, format } => {
            let dir = cli.cache_dir.ok_or("Cache directory required for inspect")?;
            commands::inspect::run(&dir, class_uid.as_deref(), &format)?;
        }
        Commands::Hash {
            url,
            params,
            headers,
        } => {
            commands::hash::run(&url, &params, &headers)?;
        }
        Commands::Version => {
            println!("ContentKit CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
