//! Julian Date conversions.

use chrono::{DateTime, TimeZone, Utc};

/// Offset between Julian Date and Modified Julian Date.
pub const MJD_OFFSET: f64 = 2_400_000.5;

/// MJD of the Unix epoch (1970-01-01T00:00:00Z).
const UNIX_EPOCH_MJD: f64 = 40_587.0;

const SECONDS_PER_DAY: f64 = 86_400.0;

pub fn jd_to_mjd(jd: f64) -> f64 {
    jd - MJD_OFFSET
}

pub fn mjd_to_jd(mjd: f64) -> f64 {
    mjd + MJD_OFFSET
}

/// UTC instant for an MJD, to millisecond precision. `None` when the value
/// is not finite or falls outside chrono's range.
pub fn mjd_to_datetime(mjd: f64) -> Option<DateTime<Utc>> {
    if !mjd.is_finite() {
        return None;
    }
    let millis = ((mjd - UNIX_EPOCH_MJD) * SECONDS_PER_DAY * 1000.0).round();
    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}

pub fn datetime_to_mjd(t: DateTime<Utc>) -> f64 {
    t.timestamp_millis() as f64 / 1000.0 / SECONDS_PER_DAY + UNIX_EPOCH_MJD
}

/// Days elapsed between an MJD and `now`; positive for past epochs.
pub fn days_ago(mjd: f64, now: DateTime<Utc>) -> f64 {
    datetime_to_mjd(now) - mjd
}

/// `days_ago` for a Julian Date.
pub fn days_ago_jd(jd: f64, now: DateTime<Utc>) -> f64 {
    days_ago(jd_to_mjd(jd), now)
}
