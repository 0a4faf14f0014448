//! Data model shared by the reconciler, the gateways and the driver.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;
use crate::time::{CSV_TIMESTAMP_LAYOUT, JSON_TIMESTAMP_LAYOUT};

/// Comment prefix the goal service seeds every new goal with.
pub const SEED_COMMENT_PREFIX: &str = "initial datapoint of 0.0";

/// Prefix of every comment this tool writes.
pub const COMMENT_PREFIX: &str = "Added with beesight";

/// One raw row of the session feed.
///
/// The source provides no identifier; position and timestamp are the only
/// correlation keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub time: String,
    pub duration: String,
}

impl SessionRecord {
    pub fn new(time: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            duration: duration.into(),
        }
    }
}

/// A datapoint ready to be submitted to the goal service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    /// Minutes, rounded to four decimal places. `None` when the session had no duration.
    pub value: Option<f64>,
    pub comment: String,
}

/// A datapoint as stored by the goal service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalDatapoint {
    #[serde(default)]
    pub id: Option<String>,
    pub timestamp: f64,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub comment: String,
}

/// The latest datapoint stored remotely; the reconciliation checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteGoalState {
    pub timestamp: f64,
    pub comment: String,
}

impl RemoteGoalState {
    /// Pick the datapoint with the greatest timestamp.
    ///
    /// The service's own ordering is not relied upon.
    pub fn latest(points: &[GoalDatapoint]) -> Option<Self> {
        points
            .iter()
            .max_by(|a, b| a.timestamp.total_cmp(&b.timestamp))
            .map(|p| Self {
                timestamp: p.timestamp,
                comment: p.comment.clone(),
            })
    }

    /// Checkpoint used when the goal has no datapoints at all.
    pub fn empty_goal() -> Self {
        Self {
            timestamp: 0.0,
            comment: SEED_COMMENT_PREFIX.to_string(),
        }
    }

    /// Whether this is the placeholder the goal service seeds new goals with.
    pub fn is_seed(&self) -> bool {
        self.comment.starts_with(SEED_COMMENT_PREFIX)
    }
}

/// Shape of the session export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    /// Newline-delimited `timestamp,duration,...` rows.
    #[default]
    Csv,
    /// `{"sessions": [{"time": .., "duration": ..}]}`
    Json,
}

impl FeedFormat {
    /// chrono layout of the `time` field.
    pub fn timestamp_layout(self) -> &'static str {
        match self {
            FeedFormat::Csv => CSV_TIMESTAMP_LAYOUT,
            FeedFormat::Json => JSON_TIMESTAMP_LAYOUT,
        }
    }

    pub fn default_framing(self) -> FeedFraming {
        match self {
            FeedFormat::Csv => FeedFraming::TABULAR,
            FeedFormat::Json => FeedFraming::NONE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedFormat::Csv => "csv",
            FeedFormat::Json => "json",
        }
    }
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(FeedFormat::Csv),
            "json" => Ok(FeedFormat::Json),
            other => Err(format!("unknown feed format '{other}' (expected csv or json)")),
        }
    }
}

/// Non-session rows at each end of the raw feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedFraming {
    pub header_rows: usize,
    pub trailer_rows: usize,
}

impl FeedFraming {
    /// Two header rows and one trailing row, as in the tabular export.
    pub const TABULAR: FeedFraming = FeedFraming {
        header_rows: 2,
        trailer_rows: 1,
    };

    pub const NONE: FeedFraming = FeedFraming {
        header_rows: 0,
        trailer_rows: 0,
    };

    /// The rows between header and trailer, or `None` if nothing is left.
    pub fn session_rows<'a, T>(&self, raw: &'a [T]) -> Option<&'a [T]> {
        let framed = self.header_rows + self.trailer_rows;
        if raw.len() <= framed {
            return None;
        }
        Some(&raw[self.header_rows..raw.len() - self.trailer_rows])
    }
}

/// Which filter the reconciler applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Goal only holds its seed datapoint: keep today's sessions.
    FirstRun,
    /// Keep sessions strictly newer than the checkpoint.
    Incremental,
}

impl FilterMode {
    pub fn for_state(state: &RemoteGoalState) -> Self {
        if state.is_seed() {
            FilterMode::FirstRun
        } else {
            FilterMode::Incremental
        }
    }
}

/// Non-fatal reason a reconciliation produced nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum InsufficientData {
    /// Only framing rows were present.
    NoSessionRows { rows: usize },
    /// A row failed to parse; the whole batch was discarded.
    Malformed { row: usize, error: FormatError },
}

impl fmt::Display for InsufficientData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsufficientData::NoSessionRows { rows } => {
                write!(f, "session feed too short ({rows} rows, no sessions)")
            }
            InsufficientData::Malformed { row, error } => {
                write!(f, "discarding batch, row {row} is malformed: {error}")
            }
        }
    }
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub mode: FilterMode,
    /// Candidates built before filtering.
    pub candidates: usize,
    pub datapoints: Vec<Datapoint>,
    pub warning: Option<InsufficientData>,
}
