//! Declared retry policy for mail API sends.
//!
//! The retryable statuses and the backoff schedule are data, not ad hoc
//! checks scattered through the send loop, so the policy is unit-testable
//! on its own.

use std::time::Duration;

/// Response statuses worth a retry: rate limiting and transient server
/// failures. Anything else is terminal for the item.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Whether a response status should be retried.
pub fn is_retryable(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Backoff to sleep after the given 1-based failed attempt, or `None` when
/// the schedule is exhausted and no further attempt should run.
pub fn backoff_after(attempt: u32, schedule_ms: &[u64]) -> Option<Duration> {
    schedule_ms
        .get(attempt.checked_sub(1)? as usize)
        .map(|ms| Duration::from_millis(*ms))
}
