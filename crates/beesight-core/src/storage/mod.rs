mod config;
mod settings;

pub use config::{BeeminderConfig, Config, InsightConfig, LoggingConfig, CONFIG_TEMPLATE};
pub use settings::{
    parse_utc_offset, BeeminderSettings, InsightSettings, SyncSettings, BEEMINDER_TOKEN_SECRET,
    DEFAULT_BEEMINDER_URL, DEFAULT_INSIGHT_URL, INSIGHT_PASSWORD_SECRET,
};

use std::path::PathBuf;

/// Returns `~/.config/beesight[-dev]/` based on BEESIGHT_ENV.
///
/// Set BEESIGHT_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("BEESIGHT_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("beesight-dev")
    } else {
        base_dir.join("beesight")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Default location of the append-only diagnostic log.
pub fn default_log_path() -> std::io::Result<PathBuf> {
    Ok(data_dir()?.join("beesight.log"))
}
