//! Session-to-datapoint reconciliation.
//!
//! Given the raw session feed and the goal's latest datapoint, decide which
//! sessions still need to be posted. The engine is pure: it does no I/O and
//! keeps no state between calls, so identical inputs always produce
//! identical outcomes.
//!
//! ## Usage
//! ```rust,ignore
//! use beesight_core::reconcile::{ReconcileConfig, Reconciler};
//!
//! let reconciler = Reconciler::new(ReconcileConfig::new(9.0), chrono::Local);
//! let outcome = reconciler.reconcile(&rows, &remote_state, today);
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};
use tracing::debug;

use super::types::{
    Datapoint, FeedFormat, FeedFraming, FilterMode, InsufficientData, ReconcileOutcome,
    RemoteGoalState, SessionRecord, COMMENT_PREFIX,
};
use crate::error::FormatError;
use crate::time;

/// Parameters of a reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    pub format: FeedFormat,
    pub framing: FeedFraming,
    /// Manual correction from the source's reporting zone, in hours.
    pub utc_offset_hours: f64,
    /// Append the session's local time to each comment.
    pub detailed_comment: bool,
}

impl ReconcileConfig {
    /// Tabular feed with its default framing.
    pub fn new(utc_offset_hours: f64) -> Self {
        Self {
            format: FeedFormat::Csv,
            framing: FeedFormat::Csv.default_framing(),
            utc_offset_hours,
            detailed_comment: false,
        }
    }

    /// Switch feed format and reset the framing to that format's default.
    pub fn with_format(mut self, format: FeedFormat) -> Self {
        self.format = format;
        self.framing = format.default_framing();
        self
    }

    pub fn with_framing(mut self, framing: FeedFraming) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_detailed_comment(mut self, detailed: bool) -> Self {
        self.detailed_comment = detailed;
        self
    }
}

/// A parsed session before filtering.
#[derive(Debug, Clone)]
struct Candidate<Tz: TimeZone> {
    instant: DateTime<Tz>,
    datapoint: Datapoint,
}

/// Reconciliation engine bound to a host time zone.
///
/// `zone` pins shifted naive session times to instants and supplies the
/// local calendar date for first-run filtering.
#[derive(Debug, Clone)]
pub struct Reconciler<Tz: TimeZone> {
    config: ReconcileConfig,
    zone: Tz,
}

impl<Tz: TimeZone> Reconciler<Tz> {
    pub fn new(config: ReconcileConfig, zone: Tz) -> Self {
        Self { config, zone }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Produce the ordered datapoints that are missing remotely.
    pub fn reconcile(
        &self,
        raw: &[SessionRecord],
        remote: &RemoteGoalState,
        today: NaiveDate,
    ) -> ReconcileOutcome {
        let mode = FilterMode::for_state(remote);

        let candidates = match self.build_candidates(raw, today) {
            Ok(candidates) => candidates,
            Err(warning) => {
                debug!(%warning, rows = raw.len(), "no candidates built");
                return ReconcileOutcome {
                    mode,
                    candidates: 0,
                    datapoints: Vec::new(),
                    warning: Some(warning),
                };
            }
        };

        let total = candidates.len();
        let datapoints = candidates
            .into_iter()
            .filter(|c| {
                let keep = match mode {
                    FilterMode::FirstRun => c.instant.date_naive() == today,
                    FilterMode::Incremental => c.datapoint.timestamp > remote.timestamp,
                };
                if !keep {
                    debug!(timestamp = c.datapoint.timestamp, ?mode, "session already covered");
                }
                keep
            })
            .map(|c| c.datapoint)
            .collect();

        ReconcileOutcome {
            mode,
            candidates: total,
            datapoints,
            warning: None,
        }
    }

    /// Parse every session row; any failure discards the whole batch.
    fn build_candidates(
        &self,
        raw: &[SessionRecord],
        today: NaiveDate,
    ) -> Result<Vec<Candidate<Tz>>, InsufficientData> {
        let rows = self
            .config
            .framing
            .session_rows(raw)
            .ok_or(InsufficientData::NoSessionRows { rows: raw.len() })?;

        rows.iter()
            .enumerate()
            .map(|(i, record)| {
                self.candidate(record, today)
                    .map_err(|error| InsufficientData::Malformed {
                        row: i + self.config.framing.header_rows,
                        error,
                    })
            })
            .collect()
    }

    fn candidate(
        &self,
        record: &SessionRecord,
        today: NaiveDate,
    ) -> Result<Candidate<Tz>, FormatError> {
        let local = time::parse_timestamp_with(
            &record.time,
            self.config.format.timestamp_layout(),
            self.config.utc_offset_hours,
        )?;
        let value = time::parse_duration(&record.duration)?;
        let instant = time::to_instant(local, &self.zone)?;

        let comment = if self.config.detailed_comment {
            detailed_comment(today, local)
        } else {
            comment(today)
        };

        Ok(Candidate {
            datapoint: Datapoint {
                timestamp: time::epoch_seconds(&instant),
                value,
                comment,
            },
            instant,
        })
    }
}

/// `Added with beesight YYYY-MM-DD`
pub fn comment(today: NaiveDate) -> String {
    format!("{COMMENT_PREFIX} {}", today.format("%Y-%m-%d"))
}

/// `Added with beesight YYYY-MM-DD. Meditation made YYYY-MM-DD HH:MM:SS.`
pub fn detailed_comment(today: NaiveDate, made: NaiveDateTime) -> String {
    format!(
        "{}. Meditation made {}.",
        comment(today),
        made.format("%Y-%m-%d %H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn feed(sessions: &[(&str, &str)]) -> Vec<SessionRecord> {
        let mut rows = vec![
            SessionRecord::new("Insight Timer Sessions", ""),
            SessionRecord::new("Started At", "Duration"),
        ];
        rows.extend(sessions.iter().map(|(t, d)| SessionRecord::new(*t, *d)));
        rows.push(SessionRecord::new("", ""));
        rows
    }

    fn seed() -> RemoteGoalState {
        RemoteGoalState {
            timestamp: 2_000_000_000.0,
            comment: "initial datapoint of 0.0 blah".to_string(),
        }
    }

    fn checkpoint(timestamp: f64) -> RemoteGoalState {
        RemoteGoalState {
            timestamp,
            comment: "some other comment".to_string(),
        }
    }

    fn utc_reconciler() -> Reconciler<Utc> {
        Reconciler::new(ReconcileConfig::new(0.0), Utc)
    }

    #[test]
    fn builds_datapoints_with_value_and_comment() {
        let rows = feed(&[("3/14/2023 9:05:00", "5:30")]);
        let outcome = utc_reconciler().reconcile(&rows, &checkpoint(0.0), day(2023, 3, 15));

        assert_eq!(outcome.warning, None);
        assert_eq!(
            outcome.datapoints,
            vec![Datapoint {
                timestamp: 1_678_784_700.0,
                value: Some(5.5),
                comment: "Added with beesight 2023-03-15".to_string(),
            }]
        );
    }

    #[test]
    fn offset_shifts_timestamp() {
        let rows = feed(&[("3/14/2023 9:05:00", "5:30")]);
        let reconciler = Reconciler::new(ReconcileConfig::new(9.0), Utc);
        let outcome = reconciler.reconcile(&rows, &checkpoint(0.0), day(2023, 3, 14));
        assert_eq!(outcome.datapoints[0].timestamp, 1_678_784_700.0 + 9.0 * 3600.0);
    }

    #[test]
    fn first_run_keeps_only_todays_sessions() {
        let rows = feed(&[
            ("3/13/2023 23:59:00", "10:00"),
            ("3/14/2023 0:00:00", "5:00"),
            ("3/14/2023 21:00:00", "20:00"),
        ]);
        let outcome = utc_reconciler().reconcile(&rows, &seed(), day(2023, 3, 14));

        assert_eq!(outcome.mode, FilterMode::FirstRun);
        assert_eq!(outcome.candidates, 3);
        let values: Vec<_> = outcome.datapoints.iter().map(|d| d.value).collect();
        assert_eq!(values, vec![Some(5.0), Some(20.0)]);
    }

    #[test]
    fn first_run_ignores_checkpoint_timestamp() {
        // Seed timestamp far in the future must not hide today's sessions.
        let rows = feed(&[("3/14/2023 8:00:00", "15:00")]);
        let outcome = utc_reconciler().reconcile(&rows, &seed(), day(2023, 3, 14));
        assert_eq!(outcome.datapoints.len(), 1);

        // And a seed timestamp of zero must not let yesterday through.
        let old_seed = RemoteGoalState {
            timestamp: 0.0,
            ..seed()
        };
        let rows = feed(&[("3/13/2023 8:00:00", "15:00")]);
        let outcome = utc_reconciler().reconcile(&rows, &old_seed, day(2023, 3, 14));
        assert!(outcome.datapoints.is_empty());
        assert_eq!(outcome.warning, None);
    }

    #[test]
    fn first_run_date_uses_host_zone() {
        // 23:30 shifted local is 2023-03-14 in the host zone regardless of UTC date.
        let rows = feed(&[("3/14/2023 23:30:00", "5:00")]);
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let reconciler = Reconciler::new(ReconcileConfig::new(0.0), tokyo);
        let outcome = reconciler.reconcile(&rows, &seed(), day(2023, 3, 14));
        assert_eq!(outcome.datapoints.len(), 1);
    }

    #[test]
    fn incremental_is_strictly_greater() {
        let rows = feed(&[
            ("1/1/1970 0:16:39", "1:00"),
            ("1/1/1970 0:16:40", "2:00"),
            ("1/1/1970 0:16:41", "3:00"),
        ]);
        let outcome = utc_reconciler().reconcile(&rows, &checkpoint(1000.0), day(2023, 3, 14));

        assert_eq!(outcome.mode, FilterMode::Incremental);
        assert_eq!(outcome.datapoints.len(), 1);
        assert_eq!(outcome.datapoints[0].timestamp, 1001.0);
        assert_eq!(outcome.datapoints[0].value, Some(3.0));
    }

    #[test]
    fn incremental_preserves_feed_order() {
        let rows = feed(&[
            ("3/14/2023 20:00:00", "3:00"),
            ("3/14/2023 9:00:00", "1:00"),
            ("3/14/2023 12:00:00", "2:00"),
        ]);
        let outcome = utc_reconciler().reconcile(&rows, &checkpoint(0.0), day(2023, 3, 14));
        let values: Vec<_> = outcome.datapoints.iter().map(|d| d.value).collect();
        assert_eq!(values, vec![Some(3.0), Some(1.0), Some(2.0)]);
    }

    #[test]
    fn framing_only_feed_is_quiet_noop() {
        let rows = feed(&[]);
        assert_eq!(rows.len(), 3);
        let outcome = utc_reconciler().reconcile(&rows, &checkpoint(0.0), day(2023, 3, 14));
        assert!(outcome.datapoints.is_empty());
        assert_eq!(outcome.warning, Some(InsufficientData::NoSessionRows { rows: 3 }));
    }

    #[test]
    fn malformed_duration_discards_entire_batch() {
        let rows = feed(&[
            ("3/14/2023 9:00:00", "5:00"),
            ("3/14/2023 10:00:00", "abc"),
            ("3/14/2023 11:00:00", "7:00"),
        ]);
        let outcome = utc_reconciler().reconcile(&rows, &checkpoint(0.0), day(2023, 3, 14));

        assert!(outcome.datapoints.is_empty());
        assert_eq!(
            outcome.warning,
            Some(InsufficientData::Malformed {
                row: 3,
                error: FormatError::Duration("abc".to_string()),
            })
        );
    }

    #[test]
    fn malformed_timestamp_discards_entire_batch() {
        let rows = feed(&[("3/14/2023 9:00:00", "5:00"), ("yesterday", "5:00")]);
        let outcome = utc_reconciler().reconcile(&rows, &seed(), day(2023, 3, 14));
        assert!(outcome.datapoints.is_empty());
        assert!(matches!(
            outcome.warning,
            Some(InsufficientData::Malformed { row: 3, .. })
        ));
    }

    #[test]
    fn unset_duration_yields_null_value() {
        let rows = feed(&[("3/14/2023 9:00:00", "-")]);
        let outcome = utc_reconciler().reconcile(&rows, &checkpoint(0.0), day(2023, 3, 14));
        assert_eq!(outcome.datapoints.len(), 1);
        assert_eq!(outcome.datapoints[0].value, None);
    }

    #[test]
    fn trailing_row_is_never_parsed() {
        let mut rows = feed(&[("3/14/2023 9:00:00", "5:00")]);
        let last = rows.len() - 1;
        rows[last] = SessionRecord::new("garbage", "garbage");
        let outcome = utc_reconciler().reconcile(&rows, &checkpoint(0.0), day(2023, 3, 14));
        assert_eq!(outcome.warning, None);
        assert_eq!(outcome.datapoints.len(), 1);
    }

    #[test]
    fn json_format_uses_twelve_hour_layout_without_framing() {
        let rows = vec![
            SessionRecord::new("Mar 14 2023 9:05 PM", "10:00"),
            SessionRecord::new("Mar 14 2023 7:00 AM", "20:00"),
        ];
        let config = ReconcileConfig::new(0.0).with_format(FeedFormat::Json);
        let outcome = Reconciler::new(config, Utc).reconcile(&rows, &seed(), day(2023, 3, 14));
        assert_eq!(outcome.datapoints.len(), 2);
        assert_eq!(outcome.datapoints[0].timestamp, 1_678_784_700.0 + 12.0 * 3600.0);
    }

    #[test]
    fn json_session_without_duration_keeps_batch() {
        let rows = vec![
            SessionRecord::new("Mar 14 2023 9:05 PM", "10:00"),
            SessionRecord::new("Mar 14 2023 7:00 AM", time::UNSET_DURATION),
        ];
        let config = ReconcileConfig::new(0.0).with_format(FeedFormat::Json);
        let outcome =
            Reconciler::new(config, Utc).reconcile(&rows, &checkpoint(0.0), day(2023, 3, 14));

        assert_eq!(outcome.warning, None);
        let values: Vec<_> = outcome.datapoints.iter().map(|d| d.value).collect();
        assert_eq!(values, vec![Some(10.0), None]);
    }

    #[test]
    fn custom_framing_keeps_trailing_row() {
        let mut rows = feed(&[("3/14/2023 9:00:00", "5:00")]);
        let last = rows.len() - 1;
        rows[last] = SessionRecord::new("3/14/2023 10:00:00", "6:00");
        let config = ReconcileConfig::new(0.0).with_framing(FeedFraming {
            header_rows: 2,
            trailer_rows: 0,
        });
        let outcome = Reconciler::new(config, Utc).reconcile(&rows, &checkpoint(0.0), day(2023, 3, 14));
        assert_eq!(outcome.datapoints.len(), 2);
    }

    #[test]
    fn detailed_comment_names_session_time() {
        let rows = feed(&[("3/14/2023 9:05:00", "5:30")]);
        let config = ReconcileConfig::new(9.0).with_detailed_comment(true);
        let outcome = Reconciler::new(config, Utc).reconcile(&rows, &checkpoint(0.0), day(2023, 3, 14));
        assert_eq!(
            outcome.datapoints[0].comment,
            "Added with beesight 2023-03-14. Meditation made 2023-03-14 18:05:00."
        );
    }

    #[test]
    fn reconcile_is_idempotent() {
        let rows = feed(&[
            ("3/14/2023 9:00:00", "5:00"),
            ("3/14/2023 10:00:00", "-"),
        ]);
        let reconciler = utc_reconciler();
        let first = reconciler.reconcile(&rows, &checkpoint(0.0), day(2023, 3, 14));
        let second = reconciler.reconcile(&rows, &checkpoint(0.0), day(2023, 3, 14));
        assert_eq!(first, second);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn session() -> impl Strategy<Value = (String, String)> {
            (1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..200, 0u32..60).prop_map(
                |(mo, d, h, mi, dm, ds)| (format!("{mo}/{d}/2023 {h}:{mi}:00"), format!("{dm}:{ds:02}")),
            )
        }

        proptest! {
            #[test]
            fn incremental_output_is_ordered_subset_above_checkpoint(
                sessions in prop::collection::vec(session(), 0..20),
                checkpoint_ts in 1_672_531_200.0f64..1_704_067_200.0,
            ) {
                let pairs: Vec<(&str, &str)> =
                    sessions.iter().map(|(t, d)| (t.as_str(), d.as_str())).collect();
                let rows = feed(&pairs);
                let reconciler = utc_reconciler();
                let outcome = reconciler.reconcile(&rows, &checkpoint(checkpoint_ts), day(2023, 6, 1));

                if sessions.is_empty() {
                    prop_assert_eq!(
                        outcome.warning.clone(),
                        Some(InsufficientData::NoSessionRows { rows: 3 })
                    );
                } else {
                    prop_assert!(outcome.warning.is_none());
                }
                prop_assert_eq!(outcome.candidates, sessions.len());
                prop_assert!(outcome.datapoints.iter().all(|d| d.timestamp > checkpoint_ts));

                let expected = sessions
                    .iter()
                    .filter_map(|(t, d)| {
                        let local = time::parse_session_timestamp(t, 0.0).ok()?;
                        let ts = local.and_utc().timestamp() as f64;
                        (ts > checkpoint_ts).then(|| (ts, time::parse_duration(d).ok().flatten()))
                    })
                    .collect::<Vec<_>>();
                let actual = outcome
                    .datapoints
                    .iter()
                    .map(|d| (d.timestamp, d.value))
                    .collect::<Vec<_>>();
                prop_assert_eq!(actual, expected);

                let again = reconciler.reconcile(&rows, &checkpoint(checkpoint_ts), day(2023, 6, 1));
                prop_assert_eq!(again, outcome);
            }
        }
    }
}
