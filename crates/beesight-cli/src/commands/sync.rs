//! Sync subcommand: one full run against the configured services.
//!
//! Prints the goal's latest datapoint after the run and the constructed
//! batch to stdout. Rejected posts are reported but do not change the
//! exit code; configuration, login and fetch failures do.

use std::path::Path;

use beesight_core::integrations::keyring_store;
use beesight_core::sync::PostFailure;
use beesight_core::{
    fetch_remote_state, BeeminderClient, Config, Datapoint, InsightClient, Reconciler,
    RemoteGoalState, SyncDriver, SyncOptions, SyncReport, SyncSettings,
};
use chrono::Local;
use serde::Serialize;

#[derive(Serialize)]
struct Summary<'a> {
    mode: beesight_core::FilterMode,
    dry_run: bool,
    checkpoint: &'a RemoteGoalState,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
    batch: &'a [Datapoint],
    posted: usize,
    failed: &'a [PostFailure],
    latest: Option<RemoteGoalState>,
}

pub fn run(config_path: &Path, dry_run: bool, batch: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_from(config_path)?;
    let settings = SyncSettings::resolve(&config, keyring_store::lookup)?;
    tracing::debug!(?settings, "resolved settings");

    let source = InsightClient::from_settings(&settings.insight)?;
    let goal = BeeminderClient::from_settings(&settings.beeminder);
    let reconciler = Reconciler::new(settings.reconcile_config(), Local);
    let options = SyncOptions { dry_run, batch };

    let today = Local::now().date_naive();
    let report = SyncDriver::new(&source, &goal, reconciler, options).run(today)?;

    // Re-read the goal so the operator sees what the service now holds.
    let latest = if dry_run || report.posted.is_empty() {
        None
    } else {
        match fetch_remote_state(&goal) {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!(error = %e, "could not re-read goal state");
                None
            }
        }
    };

    print_summary(&report, latest)?;
    tracing::info!(
        posted = report.posted.len(),
        failed = report.failed.len(),
        "sync complete"
    );
    Ok(())
}

fn print_summary(
    report: &SyncReport,
    latest: Option<RemoteGoalState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let summary = Summary {
        mode: report.mode(),
        dry_run: report.dry_run,
        checkpoint: &report.remote_state,
        warning: report.outcome.warning.as_ref().map(ToString::to_string),
        batch: report.batch(),
        posted: report.posted.len(),
        failed: &report.failed,
        latest,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
