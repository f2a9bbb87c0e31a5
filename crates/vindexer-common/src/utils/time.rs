use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

pub fn duration_since(timestamp: i64) -> Duration {
    let now = current_timestamp();
    Duration::from_secs((now - timestamp).max(0) as u64)
}

pub fn format_timestamp(timestamp: i64) -> String {
    datetime_from_unix(timestamp)
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string()
}

/// Block time to wall clock; out-of-range values collapse to the epoch.
pub fn datetime_from_unix(timestamp: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_default()
}
