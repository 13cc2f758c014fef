//! Staleness evaluation.
//!
//! Converts raw timestamps into whole minutes elapsed relative to a given
//! `now`. Unknown timestamps map to [`STALE_SENTINEL_MINUTES`], which is large
//! enough to trip every threshold.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use thiserror::Error;

use crate::TIMESTAMP_FORMAT;

/// Minutes reported for a timestamp that is not known
pub const STALE_SENTINEL_MINUTES: i64 = 99_999;

/// Human timestamp reported for unknown last data
pub const UNKNOWN_TIMESTAMP: &str = "unknown";

#[derive(Debug, Error)]
pub enum StalenessError {
    #[error("'{value}' does not match YYYY-MM-DD HH:MM:SS: {source}")]
    Malformed {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("'{0}' does not exist in the local timezone")]
    NonexistentLocalTime(String),
}

/// Staleness figures for one device, all relative to the same `now`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staleness {
    pub data_minutes: i64,
    /// Last data rendered in local time, or `unknown`
    pub data_seen: String,
    pub proto_minutes: i64,
    pub restart_minutes: i64,
    pub reboot_minutes: i64,
}

/// Minutes since the last received data, plus its human-readable form
pub fn minutes_since_last_data(latest_data: Option<f64>, now: DateTime<Local>) -> (i64, String) {
    let Some(latest) = latest_data else {
        return (STALE_SENTINEL_MINUTES, UNKNOWN_TIMESTAMP.to_string());
    };

    let seen = DateTime::from_timestamp(latest.trunc() as i64, 0)
        .map(|utc| utc.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| UNKNOWN_TIMESTAMP.to_string());

    (whole_minutes(epoch_seconds(now) - latest), seen)
}

/// Minutes since a local `YYYY-MM-DD HH:MM:SS` timestamp
pub fn minutes_since_given_time(
    value: Option<&str>,
    now: DateTime<Local>,
) -> Result<i64, StalenessError> {
    let value = match value {
        None | Some("") => return Ok(STALE_SENTINEL_MINUTES),
        Some(value) => value,
    };

    let then = parse_local(value)?;
    Ok(whole_minutes(epoch_seconds(now) - epoch_seconds(then)))
}

/// Parse a madmin timestamp as local time
pub fn parse_local(value: &str) -> Result<DateTime<Local>, StalenessError> {
    let naive = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map_err(|source| StalenessError::Malformed { value: value.to_string(), source })?;

    // Ambiguous wall-clock times resolve to the earlier instant
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| StalenessError::NonexistentLocalTime(value.to_string()))
}

fn epoch_seconds(time: DateTime<Local>) -> f64 {
    time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) / 1e9
}

/// Truncates toward zero
fn whole_minutes(seconds: f64) -> i64 {
    (seconds / 60.0) as i64
}
