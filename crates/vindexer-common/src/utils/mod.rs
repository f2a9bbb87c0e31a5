//! Utility functions and helpers

mod time;
pub mod wait;

pub use time::{current_timestamp, datetime_from_unix, duration_since, format_timestamp};
pub use wait::{wait_for, RetryPolicy, WaitOutcome};
