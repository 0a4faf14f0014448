use std::path::Path;

use beesight_core::Config;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the config file location
    Path,
    /// Write a config template if none exists
    Init,
    /// Get a config value
    Get {
        /// Config key (e.g. "insight.utc_timezone", "beeminder.goal_name")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values (secrets masked)
    List,
}

pub fn run(config_path: &Path, action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Init => {
            if Config::write_template(config_path)? {
                println!("wrote {}", config_path.display());
            } else {
                println!("{} already exists", config_path.display());
            }
        }
        ConfigAction::Get { key } => {
            let config = Config::load_from(config_path)?;
            match config.get(&key)? {
                Some(value) => println!("{value}"),
                None => println!(),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load_from(config_path)?;
            config.set(&key, &value)?;
            config.save_to(config_path)?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = Config::load_from(config_path)?;
            let json = serde_json::to_string_pretty(&config.redacted())?;
            println!("{json}");
        }
    }
    Ok(())
}
