//! Time utilities for Claimward.
//!
//! Persisted timestamps are Unix epoch milliseconds (i64).

use chrono::{DateTime, Duration, Utc};

/// Return the current wall-clock time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a timestamp to Unix epoch milliseconds for storage.
pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Convert stored Unix epoch milliseconds back to a timestamp.
///
/// Out-of-range values clamp to the Unix epoch rather than failing.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH)
}

/// The instant `days` days before `now`.
pub fn days_before(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now - Duration::days(i64::from(days))
}
