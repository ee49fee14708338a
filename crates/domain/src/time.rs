//! Time and timestamp helpers.

use chrono::{DateTime, Local, Utc};

/// Epoch-second timestamp used for `next_at` and scheduler arithmetic.
pub type Timestamp = i64;

/// Current time as epoch seconds.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now().timestamp()
}

/// Current local wall-clock time, used for schedule arithmetic.
#[must_use]
pub fn local_now() -> DateTime<Local> {
    Local::now()
}
