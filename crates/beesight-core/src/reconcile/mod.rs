//! Reconciliation of raw session feeds against the goal's checkpoint.

pub mod engine;
pub mod types;

pub use engine::{comment, detailed_comment, ReconcileConfig, Reconciler};
pub use types::{
    Datapoint, FeedFormat, FeedFraming, FilterMode, GoalDatapoint, InsufficientData,
    ReconcileOutcome, RemoteGoalState, SessionRecord, COMMENT_PREFIX, SEED_COMMENT_PREFIX,
};
