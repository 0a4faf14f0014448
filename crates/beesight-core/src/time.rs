//! Time conversion for session feed values.
//!
//! The session source reports wall-clock times in its own reporting zone
//! without any offset information. The operator supplies a manual UTC
//! offset (fractional hours) that shifts those naive times into their own
//! zone; the shifted naive time is then pinned to an instant using the
//! host zone handed to the reconciler.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone};

use crate::error::FormatError;

/// Duration sentinel meaning "no duration recorded".
pub const UNSET_DURATION: &str = "-";

/// `M/D/Y H:Min:S`, 24-hour clock, leading zeros optional.
pub const CSV_TIMESTAMP_LAYOUT: &str = "%m/%d/%Y %H:%M:%S";

/// `Mon D YYYY H:MM AM`, as used by the JSON session listing.
pub const JSON_TIMESTAMP_LAYOUT: &str = "%b %d %Y %I:%M %p";

/// Round to four decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Parse an `M:S` duration into fractional minutes.
///
/// Returns `Ok(None)` for the unset sentinel. Both components must be
/// non-negative integers; anything else is a [`FormatError::Duration`].
pub fn parse_duration(raw: &str) -> Result<Option<f64>, FormatError> {
    let trimmed = raw.trim();
    if trimmed == UNSET_DURATION {
        return Ok(None);
    }

    let (minutes, seconds) = trimmed
        .split_once(':')
        .ok_or_else(|| FormatError::Duration(raw.to_string()))?;

    let minutes: u64 = minutes
        .parse()
        .map_err(|_| FormatError::Duration(raw.to_string()))?;
    let seconds: u64 = seconds
        .parse()
        .map_err(|_| FormatError::Duration(raw.to_string()))?;

    Ok(Some(round4(minutes as f64 + seconds as f64 / 60.0)))
}

/// Convert a fractional-hours offset into a chrono duration (millisecond precision).
pub fn offset_duration(utc_offset_hours: f64) -> Duration {
    Duration::milliseconds((utc_offset_hours * 3_600_000.0).round() as i64)
}

/// Parse a naive timestamp in `layout` and shift it by `utc_offset_hours`.
pub fn parse_timestamp_with(
    raw: &str,
    layout: &str,
    utc_offset_hours: f64,
) -> Result<NaiveDateTime, FormatError> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), layout).map_err(|e| {
        FormatError::Timestamp {
            raw: raw.to_string(),
            message: e.to_string(),
        }
    })?;

    naive
        .checked_add_signed(offset_duration(utc_offset_hours))
        .ok_or_else(|| FormatError::Timestamp {
            raw: raw.to_string(),
            message: format!("offset of {utc_offset_hours} hours is out of range"),
        })
}

/// Parse a tabular-feed timestamp (`M/D/Y H:Min:S`) and apply the offset.
pub fn parse_session_timestamp(
    raw: &str,
    utc_offset_hours: f64,
) -> Result<NaiveDateTime, FormatError> {
    parse_timestamp_with(raw, CSV_TIMESTAMP_LAYOUT, utc_offset_hours)
}

/// Pin a shifted local time to an instant in `zone`.
///
/// Ambiguous local times (DST fold) resolve to the earlier instant.
pub fn to_instant<Tz: TimeZone>(
    local: NaiveDateTime,
    zone: &Tz,
) -> Result<DateTime<Tz>, FormatError> {
    zone.from_local_datetime(&local)
        .earliest()
        .ok_or_else(|| FormatError::NonexistentLocalTime(local.to_string()))
}

/// Seconds since the Unix epoch, fractional.
pub fn epoch_seconds<Tz: TimeZone>(instant: &DateTime<Tz>) -> f64 {
    instant.timestamp() as f64 + f64::from(instant.timestamp_subsec_millis()) / 1_000.0
}
