// src/utils/time.rs
//! Clock helpers. Verification takes `now` explicitly; these are for call sites.

use chrono::{DateTime, TimeZone, Utc};

/// Current time as whole seconds since the Unix epoch.
pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Converts Unix seconds into a UTC timestamp, clamping out-of-range values to the epoch.
pub fn from_unix(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
