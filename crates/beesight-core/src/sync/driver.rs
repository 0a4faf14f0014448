//! One sync run: checkpoint, sessions, reconcile, post.

use chrono::{NaiveDate, TimeZone};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{CoreError, PostError};
use crate::integrations::{GoalGateway, SessionSource};
use crate::reconcile::{Datapoint, FilterMode, ReconcileOutcome, Reconciler, RemoteGoalState};

/// Switches for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Reconcile and report, but post nothing.
    pub dry_run: bool,
    /// Submit everything in one batch request instead of one request per datapoint.
    pub batch: bool,
}

/// A datapoint the goal service did not accept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostFailure {
    pub datapoint: Datapoint,
    pub error: String,
    #[serde(skip)]
    pub cause: PostError,
}

/// What a run did.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub remote_state: RemoteGoalState,
    pub outcome: ReconcileOutcome,
    pub posted: Vec<Datapoint>,
    pub failed: Vec<PostFailure>,
    pub dry_run: bool,
}

impl SyncReport {
    /// The constructed batch, whether or not it was posted.
    pub fn batch(&self) -> &[Datapoint] {
        &self.outcome.datapoints
    }

    pub fn mode(&self) -> FilterMode {
        self.outcome.mode
    }
}

/// Read the goal's checkpoint: the stored datapoint with the greatest timestamp.
///
/// A goal with no datapoints at all is treated like a freshly seeded one.
pub fn fetch_remote_state(goal: &dyn GoalGateway) -> Result<RemoteGoalState, CoreError> {
    let points = goal.fetch_datapoints()?;
    debug!(count = points.len(), gateway = goal.name(), "fetched goal datapoints");

    Ok(RemoteGoalState::latest(&points).unwrap_or_else(|| {
        warn!(gateway = goal.name(), "goal has no datapoints, treating as first run");
        RemoteGoalState::empty_goal()
    }))
}

/// Orchestrates a single, strictly sequential sync run.
pub struct SyncDriver<'a, Tz: TimeZone> {
    source: &'a dyn SessionSource,
    goal: &'a dyn GoalGateway,
    reconciler: Reconciler<Tz>,
    options: SyncOptions,
}

impl<'a, Tz: TimeZone> SyncDriver<'a, Tz> {
    pub fn new(
        source: &'a dyn SessionSource,
        goal: &'a dyn GoalGateway,
        reconciler: Reconciler<Tz>,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            goal,
            reconciler,
            options,
        }
    }

    /// Run once for `today`.
    ///
    /// # Errors
    ///
    /// Fetch and login failures abort the run. Data-quality problems and
    /// rejected posts do not; they are reported in the returned [`SyncReport`].
    pub fn run(&self, today: NaiveDate) -> Result<SyncReport, CoreError> {
        let remote_state = fetch_remote_state(self.goal)?;
        info!(
            timestamp = remote_state.timestamp,
            comment = %remote_state.comment,
            "goal checkpoint"
        );

        if self.source.feed_format() != self.reconciler.config().format {
            warn!(
                source = %self.source.feed_format(),
                reconciler = %self.reconciler.config().format,
                "feed format mismatch between source and reconciler"
            );
        }

        let raw = self.source.fetch_sessions()?;
        let outcome = self.reconciler.reconcile(&raw, &remote_state, today);

        if let Some(warning) = &outcome.warning {
            warn!(%warning, "insufficient session data, nothing to sync");
        }
        info!(
            mode = ?outcome.mode,
            candidates = outcome.candidates,
            new = outcome.datapoints.len(),
            "reconciled sessions"
        );

        let (posted, failed) = if self.options.dry_run {
            info!(count = outcome.datapoints.len(), "dry run, not posting");
            (Vec::new(), Vec::new())
        } else if self.options.batch {
            self.post_batch(&outcome.datapoints)
        } else {
            self.post_each(&outcome.datapoints)
        };

        Ok(SyncReport {
            remote_state,
            outcome,
            posted,
            failed,
            dry_run: self.options.dry_run,
        })
    }

    /// One request per datapoint, in order; a failure skips only that datapoint.
    fn post_each(&self, datapoints: &[Datapoint]) -> (Vec<Datapoint>, Vec<PostFailure>) {
        let mut posted = Vec::new();
        let mut failed = Vec::new();

        for datapoint in datapoints {
            match self.goal.post_datapoint(datapoint) {
                Ok(()) => {
                    info!(timestamp = datapoint.timestamp, value = ?datapoint.value, "posted");
                    posted.push(datapoint.clone());
                }
                Err(cause) => {
                    warn!(timestamp = datapoint.timestamp, error = %cause, "post failed, continuing");
                    failed.push(PostFailure {
                        datapoint: datapoint.clone(),
                        error: cause.to_string(),
                        cause,
                    });
                }
            }
        }

        (posted, failed)
    }

    fn post_batch(&self, datapoints: &[Datapoint]) -> (Vec<Datapoint>, Vec<PostFailure>) {
        if datapoints.is_empty() {
            return (Vec::new(), Vec::new());
        }

        match self.goal.post_datapoints(datapoints) {
            Ok(()) => {
                info!(count = datapoints.len(), "posted batch");
                (datapoints.to_vec(), Vec::new())
            }
            Err(cause) => {
                warn!(count = datapoints.len(), error = %cause, "batch post failed");
                let failed = datapoints
                    .iter()
                    .map(|d| PostFailure {
                        datapoint: d.clone(),
                        error: cause.to_string(),
                        cause: cause.clone(),
                    })
                    .collect();
                (Vec::new(), failed)
            }
        }
    }
}
