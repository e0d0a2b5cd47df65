//! Reconnect backoff policy.
//!
//! Multiplicative growth from a base delay up to a hard cap, no jitter.
//! The delay is advanced on every close and reset on every successful open.

use std::time::Duration;

use crate::error::ClientError;

/// Default first reconnect delay.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);
/// Default upper bound for the reconnect delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(10_000);
/// Default growth factor applied on every close.
pub const DEFAULT_MULTIPLIER: f64 = 1.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
    multiplier: f64,
}

impl BackoffPolicy {
    /// Build a policy, rejecting shapes that could shrink the delay.
    pub fn new(base: Duration, max: Duration, multiplier: f64) -> Result<Self, ClientError> {
        if base.is_zero() || max < base {
            return Err(ClientError::InvalidBackoff(format!(
                "base {}ms must be non-zero and not exceed max {}ms",
                base.as_millis(),
                max.as_millis()
            )));
        }
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ClientError::InvalidBackoff(format!(
                "multiplier {multiplier} must be a finite value >= 1"
            )));
        }

        Ok(Self {
            base,
            max,
            multiplier,
        })
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Delay to wait after the next close, given the current delay.
    pub fn next(&self, delay: Duration) -> Duration {
        if delay >= self.max {
            return self.max;
        }
        // Products too large for a Duration saturate at the cap.
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.multiplier)
            .map_or(self.max, |next| next.min(self.max))
    }

    /// Delay restored after a successful open.
    pub fn reset(&self) -> Duration {
        self.base
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_DELAY,
            max: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_next_grows_by_a_quarter() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next(ms(100)), ms(125));
        assert_eq!(policy.next(ms(125)), Duration::from_micros(156_250));
        assert_eq!(policy.next(ms(4_000)), ms(5_000));
    }

    #[test]
    fn test_next_matches_formula_across_range() {
        let policy = BackoffPolicy::default();
        for d in (100..=10_000).step_by(97) {
            let expected = ms(d).mul_f64(1.25).min(ms(10_000));
            assert_eq!(policy.next(ms(d)), expected, "delay {d}ms");
        }
    }

    #[test]
    fn test_next_is_monotonic_and_converges_to_cap() {
        let policy = BackoffPolicy::default();
        let mut delay = policy.reset();
        for _ in 0..100 {
            let next = policy.next(delay);
            assert!(next >= delay);
            delay = next;
        }
        assert_eq!(delay, ms(10_000));
        assert_eq!(policy.next(ms(10_000)), ms(10_000));
        assert_eq!(policy.next(ms(60_000)), ms(10_000));
    }

    #[test]
    fn test_reset_returns_base() {
        let policy = BackoffPolicy::new(ms(250), ms(2_000), 2.0).unwrap();
        assert_eq!(policy.reset(), ms(250));
        assert_eq!(policy.next(ms(1_500)), ms(2_000));
    }

    #[test]
    fn test_rejects_invalid_shapes() {
        assert!(BackoffPolicy::new(ms(0), ms(100), 1.25).is_err());
        assert!(BackoffPolicy::new(ms(500), ms(100), 1.25).is_err());
        assert!(BackoffPolicy::new(ms(100), ms(1_000), 0.5).is_err());
        assert!(BackoffPolicy::new(ms(100), ms(1_000), f64::NAN).is_err());
    }

    #[test]
    fn test_huge_multiplier_saturates_at_cap() {
        let policy = BackoffPolicy::new(ms(100), ms(10_000), 1e30).unwrap();
        assert_eq!(policy.next(ms(100)), ms(10_000));
        assert_eq!(policy.next(Duration::from_nanos(1)), ms(10_000));
    }
}
