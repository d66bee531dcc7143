//! Tidy Control - command line front end for the tidy history engine
//!
//! Runs the background network sampler, records cleanup and memory
//! optimization results reported by the effectors, and prints the rollups.

mod commands;
mod logging;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tidy_common::config::{self, TidyConfig};
use tidy_common::History;

#[derive(Parser)]
#[command(name = "tidyctl")]
#[command(about = "Tidy - machine health history", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to $TIDY_CONFIG or the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Domain {
    Clean,
    Memory,
    Network,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample network traffic until Ctrl-C
    Run,

    /// Record a finished junk cleanup
    RecordClean {
        /// Bytes freed
        #[arg(long)]
        freed_bytes: i64,

        /// Files removed
        #[arg(long)]
        count: u64,

        /// Files that could not be removed
        #[arg(long, default_value_t = 0)]
        failed: u64,
    },

    /// Record a finished memory optimization
    RecordOptimize {
        /// Megabytes freed
        #[arg(long)]
        freed_mb: f64,

        /// Memory used before, percent
        #[arg(long)]
        before: f64,

        /// Memory used after, percent
        #[arg(long)]
        after: f64,
    },

    /// Show history rollups
    Stats {
        #[arg(value_enum)]
        domain: Domain,

        /// Print the read model as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show where history is stored
    Paths,

    /// Write the effective config to the config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TidyConfig::load_or_default(path),
        None => TidyConfig::load(),
    };
    logging::init(&config.log.level, cli.verbose);

    let history = History::from_config(&config);

    match cli.command {
        Commands::Run => commands::run(&config, history).await,
        Commands::RecordClean { freed_bytes, count, failed } => {
            commands::record_clean(&history, freed_bytes, count, failed)
        }
        Commands::RecordOptimize { freed_mb, before, after } => {
            commands::record_optimize(&history, freed_mb, before, after)
        }
        Commands::Stats { domain, json } => commands::stats(&history, domain, json),
        Commands::Paths => {
            let config_file = cli.config.or_else(config::config_path);
            commands::paths(&config, &history, config_file.as_deref());
            Ok(())
        }
        Commands::InitConfig { force } => {
            let config_file = cli
                .config
                .or_else(config::config_path)
                .context("No config directory on this system, pass --config")?;
            commands::init_config(&config, &config_file, force)
        }
    }
}
