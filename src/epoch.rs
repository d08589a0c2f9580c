//! UT timestamps and Modified Julian Dates.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// MJD of the Unix epoch (1970-01-01T00:00:00 UTC).
const MJD_UNIX_EPOCH: f64 = 40587.0;
const MICROS_PER_DAY: f64 = 86_400_000_000.0;

/// Combine header `UT_DATE` and `UT_TIME` into an ISO-8601 string and its UTC instant.
///
/// Dates may use `-` or `/`; times may carry a fractional second.
pub fn parse_ut(date: &str, time: &str) -> Option<(String, NaiveDateTime)> {
    let date = date.trim().replace('/', "-");
    let time = time.trim();
    let d = NaiveDate::parse_from_str(&date, "%Y-%m-%d").ok()?;
    let t = NaiveTime::parse_from_str(time, "%H:%M:%S%.f").ok()?;
    Some((format!("{}T{}", date, time), d.and_time(t)))
}

pub fn mjd(instant: &NaiveDateTime) -> f64 {
    instant.and_utc().timestamp_micros() as f64 / MICROS_PER_DAY + MJD_UNIX_EPOCH
}
