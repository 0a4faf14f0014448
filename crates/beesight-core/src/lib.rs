//! # beesight Core Library
//!
//! Synchronizes meditation sessions recorded by Insight Timer into a
//! Beeminder goal. All logic lives here; the `beesight` binary is a thin
//! layer that parses arguments, installs logging and prints results.
//!
//! ## Architecture
//!
//! - **Time Conversion**: feed timestamps and `M:S` durations to instants and minutes
//! - **Reconciliation**: a pure engine deciding which sessions are new
//!   relative to the goal's latest datapoint
//! - **Integrations**: HTTP gateways for the session source and the goal service
//! - **Sync**: the driver that sequences one run
//! - **Storage**: TOML configuration and validated run settings
//!
//! ## Key Components
//!
//! - [`Reconciler`]: the reconciliation engine
//! - [`SyncDriver`]: one sync run
//! - [`Config`] / [`SyncSettings`]: configuration management

pub mod error;
pub mod integrations;
pub mod reconcile;
pub mod storage;
pub mod sync;
pub mod time;

pub use error::{AuthError, ConfigError, CoreError, FormatError, GatewayError, PostError};
pub use integrations::{BeeminderClient, GoalGateway, InsightClient, SessionSource};
pub use reconcile::{
    Datapoint, FeedFormat, FeedFraming, FilterMode, GoalDatapoint, InsufficientData,
    ReconcileConfig, ReconcileOutcome, Reconciler, RemoteGoalState, SessionRecord,
};
pub use storage::{Config, SyncSettings};
pub use sync::{fetch_remote_state, SyncDriver, SyncOptions, SyncReport};
