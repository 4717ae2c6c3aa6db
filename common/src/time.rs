// A simple module to define the time types used in the project
//
// Engine operations never read the wall clock directly: callers pass the
// timestamp in, so listing expiry and record timestamps stay reproducible
// in tests.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::SECONDS_PER_DAY;

// Seconds timestamps used to determine it using its type
pub type TimestampSeconds = u64;

#[inline]
pub fn get_current_time() -> Duration {
    // A clock set before the epoch yields zero instead of panicking
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

// Return timestamp in seconds
pub fn get_current_time_in_seconds() -> TimestampSeconds {
    get_current_time().as_secs()
}

// Timestamp `days` days after `from`, None on overflow
pub fn add_days(from: TimestampSeconds, days: u32) -> Option<TimestampSeconds> {
    (days as u64)
        .checked_mul(SECONDS_PER_DAY)
        .and_then(|secs| from.checked_add(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_days() {
        assert_eq!(add_days(0, 1), Some(SECONDS_PER_DAY));
        assert_eq!(add_days(100, 30), Some(100 + 30 * SECONDS_PER_DAY));
        assert_eq!(add_days(u64::MAX, 1), None);
    }
}
