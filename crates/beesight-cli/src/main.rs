use std::path::PathBuf;

use beesight_core::Config;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "beesight", version, about = "Sync Insight Timer sessions into a Beeminder goal")]
struct Cli {
    /// Path to config.toml (default: ~/.config/beesight/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Post new meditation sessions to the goal
    Sync {
        /// Reconcile and print the batch without posting
        #[arg(long)]
        dry_run: bool,
        /// Submit all datapoints in a single request
        #[arg(long)]
        batch: bool,
    },
    /// Show the goal's latest datapoint
    State,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Credential storage in the OS keyring
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
}

fn main() {
    let cli = Cli::parse();

    let config_path = match cli.config.map(Ok).unwrap_or_else(Config::default_path) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let log_guard = logging::init(logging::log_file_for(&config_path).as_deref());

    let result = match cli.command {
        Commands::Sync { dry_run, batch } => commands::sync::run(&config_path, dry_run, batch),
        Commands::State => commands::state::run(&config_path),
        Commands::Config { action } => commands::config::run(&config_path, action),
        Commands::Auth { action } => commands::auth::run(action),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "run aborted");
        eprintln!("error: {e}");
        drop(log_guard);
        std::process::exit(1);
    }
}
