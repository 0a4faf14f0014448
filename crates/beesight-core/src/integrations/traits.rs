use crate::error::{CoreError, GatewayError, PostError};
use crate::reconcile::{Datapoint, FeedFormat, GoalDatapoint, SessionRecord};

/// Where meditation sessions come from.
///
/// Implementations re-fetch the complete history on every call; the source
/// offers no incremental export.
pub trait SessionSource {
    /// Unique identifier (e.g. "insight").
    fn name(&self) -> &str;

    /// Shape of the rows returned by [`fetch_sessions`](Self::fetch_sessions).
    fn feed_format(&self) -> FeedFormat;

    /// Log in and fetch every raw row of the export, framing rows included.
    ///
    /// Login failures surface as [`CoreError::Auth`], fetch failures as
    /// [`CoreError::Gateway`].
    fn fetch_sessions(&self) -> Result<Vec<SessionRecord>, CoreError>;
}

/// The goal-tracking service's datapoint log for one goal.
pub trait GoalGateway {
    /// Unique identifier (e.g. "beeminder").
    fn name(&self) -> &str;

    /// Every datapoint currently stored, in whatever order the service returns.
    fn fetch_datapoints(&self) -> Result<Vec<GoalDatapoint>, GatewayError>;

    /// Submit one datapoint.
    fn post_datapoint(&self, datapoint: &Datapoint) -> Result<(), PostError>;

    /// Submit several datapoints at once. Stops at the first failure by default.
    fn post_datapoints(&self, datapoints: &[Datapoint]) -> Result<(), PostError> {
        datapoints.iter().try_for_each(|d| self.post_datapoint(d))
    }
}
