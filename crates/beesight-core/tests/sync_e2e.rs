//! E2E tests for a full sync run.
//!
//! Both services are mocked with `mockito`; the run goes through the same
//! path the CLI uses: config file -> settings -> clients -> driver.

use std::collections::HashMap;

use beesight_core::integrations::{BeeminderClient, InsightClient};
use beesight_core::{
    Config, CoreError, FilterMode, ReconcileConfig, Reconciler, SyncDriver, SyncOptions,
    SyncSettings,
};
use chrono::{NaiveDate, Utc};
use mockito::{Matcher, Server};

const DATAPOINTS_PATH: &str = "/users/me/goals/meditate/datapoints.json";

const CSV_EXPORT: &str = "\
Insight Timer session export
Started At,Duration,Preset
3/14/2023 9:00:00,5:00,Morning
3/14/2023 10:00:00,6:30,Midday
3/14/2023 11:00:00,-,Evening
";

fn write_config(dir: &tempfile::TempDir, insight: &Server, beeminder: &Server) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    let content = format!(
        r#"
[insight]
username = "me@example.com"
utc_timezone = "0"
base_url = "{}"

[beeminder]
username = "me"
goal_name = "meditate"
base_url = "{}"
"#,
        insight.url(),
        beeminder.url()
    );
    std::fs::write(&path, content).unwrap();
    path
}

/// In-memory stand-in for the OS keyring.
fn secrets() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("insight_password", "hunter2"),
        ("beeminder_auth_token", "tok"),
    ])
}

fn settings_from(path: &std::path::Path) -> SyncSettings {
    let config = Config::load_from(path).unwrap();
    let store = secrets();
    SyncSettings::resolve(&config, |key| store.get(key).map(|v| v.to_string())).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 3, 14).unwrap()
}

fn run(settings: &SyncSettings, options: SyncOptions) -> Result<beesight_core::SyncReport, CoreError> {
    let source = InsightClient::from_settings(&settings.insight).unwrap();
    let goal = BeeminderClient::from_settings(&settings.beeminder);
    let reconciler = Reconciler::new(settings.reconcile_config(), Utc);
    SyncDriver::new(&source, &goal, reconciler, options).run(today())
}

fn mock_insight(server: &mut Server) {
    server.mock("POST", "/user_session").with_status(200).create();
    server
        .mock("GET", "/sessions/export")
        .with_status(200)
        .with_body(CSV_EXPORT)
        .create();
}

#[test]
fn incremental_sync_posts_new_sessions_and_isolates_failures() {
    let mut insight = Server::new();
    let mut beeminder = Server::new();
    mock_insight(&mut insight);

    // Checkpoint at 09:00; the service lists it out of order.
    beeminder
        .mock("GET", DATAPOINTS_PATH)
        .match_query(Matcher::UrlEncoded("auth_token".into(), "tok".into()))
        .with_status(200)
        .with_body(
            r#"[
                {"id": "b", "timestamp": 1678700000, "value": 3, "comment": "older"},
                {"id": "c", "timestamp": 1678784400, "value": 5, "comment": "Added with beesight 2023-03-14"},
                {"id": "a", "timestamp": 1678000000, "value": 0, "comment": "initial datapoint of 0.0"}
            ]"#,
        )
        .create();
    let ten_oclock = beeminder
        .mock("POST", DATAPOINTS_PATH)
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("timestamp".into(), "1678788000".into()),
            Matcher::UrlEncoded("value".into(), "6.5".into()),
            Matcher::UrlEncoded("comment".into(), "Added with beesight 2023-03-14".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"id": "d"}"#)
        .expect(1)
        .create();

    let dir = tempfile::tempdir().unwrap();
    let settings = settings_from(&write_config(&dir, &insight, &beeminder));
    let report = run(&settings, SyncOptions::default()).unwrap();

    ten_oclock.assert();
    assert_eq!(report.mode(), FilterMode::Incremental);
    assert_eq!(report.remote_state.timestamp, 1_678_784_400.0);
    assert_eq!(report.batch().len(), 2);
    assert_eq!(report.posted.len(), 1);
    // 11:00 had no duration; the goal gateway refuses it without a request.
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].datapoint.timestamp, 1_678_791_600.0);
}

#[test]
fn first_run_against_seeded_goal() {
    let mut insight = Server::new();
    let mut beeminder = Server::new();
    mock_insight(&mut insight);

    beeminder
        .mock("GET", DATAPOINTS_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"[{"id": "a", "timestamp": 1678800000, "value": 0, "comment": "initial datapoint of 0.0 on March 14"}]"#)
        .create();
    let posts = beeminder
        .mock("POST", DATAPOINTS_PATH)
        .with_status(200)
        .expect(2)
        .create();

    let dir = tempfile::tempdir().unwrap();
    let settings = settings_from(&write_config(&dir, &insight, &beeminder));
    let report = run(&settings, SyncOptions::default()).unwrap();

    posts.assert();
    assert_eq!(report.mode(), FilterMode::FirstRun);
    assert_eq!(report.batch().len(), 3);
    assert_eq!(report.posted.len(), 2);
}

#[test]
fn rejected_login_is_fatal_and_posts_nothing() {
    let mut insight = Server::new();
    let mut beeminder = Server::new();
    insight.mock("POST", "/user_session").with_status(401).create();
    beeminder
        .mock("GET", DATAPOINTS_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("[]")
        .create();
    let posts = beeminder.mock("POST", Matcher::Any).expect(0).create();

    let dir = tempfile::tempdir().unwrap();
    let settings = settings_from(&write_config(&dir, &insight, &beeminder));
    let err = run(&settings, SyncOptions::default()).unwrap_err();

    posts.assert();
    assert!(matches!(err, CoreError::Auth(_)));
}

#[test]
fn missing_goal_name_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[insight]\nusername = \"u\"\npassword = \"p\"\nutc_timezone = \"0\"\n[beeminder]\nusername = \"me\"\nauth_token = \"t\"\n",
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    let err = SyncSettings::resolve(&config, |_| None).unwrap_err();
    assert_eq!(err.to_string(), "Missing required configuration key: beeminder.goal_name");
}

#[test]
fn reconcile_config_from_settings_matches_feed() {
    let insight = Server::new();
    let beeminder = Server::new();
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_from(&write_config(&dir, &insight, &beeminder));
    assert_eq!(settings.reconcile_config(), ReconcileConfig::new(0.0));
}
