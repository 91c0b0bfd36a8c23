//! Exponential backoff calculator (spec §4.2, "L2"). A pure function of
//! the attempt number; no clock, no randomness, no I/O.

use std::time::Duration;

/// Default base delay before any doubling is applied.
pub const DEFAULT_BASE: Duration = Duration::from_secs(2);
/// Default cap on the computed delay.
pub const DEFAULT_CAP: Duration = Duration::from_secs(60);

/// `backoff(attempt, base, cap) = min(cap, 2^attempt * base / 2)`.
///
/// `attempt = 0` yields `base / 2`; each following attempt doubles the
/// previous delay, capped at `cap`. Monotonic nondecreasing in `attempt`.
pub fn backoff(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let base_ms = base.as_secs_f64() * 1000.0;
    let factor = 2f64.powi(attempt as i32) / 2.0;
    let delay_ms = base_ms * factor;
    let cap_ms = cap.as_secs_f64() * 1000.0;
    Duration::from_secs_f64(delay_ms.min(cap_ms) / 1000.0)
}

/// [`backoff`] with the spec's default base (2s) and cap (60s).
pub fn backoff_default(attempt: u32) -> Duration {
    backoff(attempt, DEFAULT_BASE, DEFAULT_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_zero_is_half_base() {
        assert_eq!(backoff_default(0), Duration::from_secs(1));
    }

    #[test]
    fn attempt_one_is_base() {
        assert_eq!(backoff_default(1), Duration::from_secs(2));
    }

    #[test]
    fn doubles_each_attempt_until_cap() {
        assert_eq!(backoff_default(2), Duration::from_secs(4));
        assert_eq!(backoff_default(3), Duration::from_secs(8));
        assert_eq!(backoff_default(4), Duration::from_secs(16));
        assert_eq!(backoff_default(5), Duration::from_secs(32));
    }

    #[test]
    fn caps_at_max() {
        assert_eq!(backoff_default(6), Duration::from_secs(60));
        assert_eq!(backoff_default(20), Duration::from_secs(60));
    }

    #[test]
    fn monotonic_nondecreasing() {
        let mut prev = backoff_default(0);
        for attempt in 1..30 {
            let next = backoff_default(attempt);
            assert!(next >= prev);
            prev = next;
        }
    }
}
