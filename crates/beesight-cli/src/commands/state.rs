//! State subcommand: print the goal's reconciliation checkpoint.

use std::path::Path;

use beesight_core::integrations::keyring_store;
use beesight_core::{fetch_remote_state, BeeminderClient, Config, FilterMode, SyncSettings};
use serde_json::json;

pub fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_from(config_path)?;
    let settings = SyncSettings::resolve(&config, keyring_store::lookup)?;
    let goal = BeeminderClient::from_settings(&settings.beeminder);

    let state = fetch_remote_state(&goal)?;
    let mode = FilterMode::for_state(&state);

    let out = json!({
        "goal": settings.beeminder.goal_name,
        "latest": state,
        "next_mode": mode,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
