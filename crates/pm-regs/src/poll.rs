//! Poll cadence and deadlines.
//!
//! Deadlines are accounted in whole microseconds by adding the poll interval
//! to a counter until it reaches `timeout_s * 1_000_000`; the elapsed time is
//! never read back from a clock.

use std::time::Duration;

/// Sleep between two samples, in microseconds.
pub const POLL_INTERVAL_US: u64 = 100 * 1000;

/// Sleep between two samples.
pub const POLL_INTERVAL: Duration = Duration::from_micros(POLL_INTERVAL_US);

/// Microseconds per second.
pub const US_PER_S: u64 = 1000 * 1000;

/// Deadline for a `runtime_status` transition.
pub const STATUS_TIMEOUT_S: u32 = 10;

/// Deadline when deep residency is expected to move.
///
/// Only reached in the failure case, so it can be generous.
pub const RESIDENCY_REACHED_TIMEOUT_S: u32 = 30;

/// Window during which deep residency must stay frozen.
///
/// Every successful check costs the full window.
pub const RESIDENCY_BLOCKED_TIMEOUT_S: u32 = 5;

/// Number of samples taken for a deadline of `timeout_s` seconds.
#[must_use]
pub const fn attempts(timeout_s: u32) -> u64 {
    let budget = timeout_s as u64 * US_PER_S;
    budget.div_ceil(POLL_INTERVAL_US)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_samples_per_second() {
        assert_eq!(attempts(1), 10);
        assert_eq!(attempts(5), 50);
        assert_eq!(attempts(STATUS_TIMEOUT_S), 100);
    }

    #[test]
    fn interval_matches_micros() {
        assert_eq!(POLL_INTERVAL.as_micros(), u128::from(POLL_INTERVAL_US));
    }
}
