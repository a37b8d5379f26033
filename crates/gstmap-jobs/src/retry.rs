//! Retry and pacing policy for per-record portal work.

use rand::Rng;
use std::time::Duration;

/// Bounded exponential backoff for one record.
///
/// Attempt `n` (1-based) waits `base_delay * 2^(n-1)` before running, except
/// the first attempt which runs immediately. Once `max_attempts` are spent
/// the record is recorded as failed and the run moves on.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per record, including the first.
    pub max_attempts: u32,
    /// Backoff unit.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay to sleep before the given 1-based attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        self.base_delay * 2u32.saturating_pow(attempt - 2)
    }
}

/// Randomized pause between records so successive portal hits do not arrive
/// in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct DelayRange {
    /// Lower bound of the pause.
    pub min: Duration,
    /// Upper bound of the pause.
    pub max: Duration,
}

impl DelayRange {
    /// Draw a pause length.
    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min_ms = u64::try_from(self.min.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_secs(2),
        };
        assert_eq!(policy.delay_for(1), Duration::ZERO);
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
    }

    #[test]
    fn test_delay_range_sample_within_bounds() {
        let range = DelayRange {
            min: Duration::from_millis(100),
            max: Duration::from_millis(300),
        };
        for _ in 0..32 {
            let pause = range.sample();
            assert!(pause >= range.min && pause <= range.max);
        }
    }

    #[test]
    fn test_degenerate_range_returns_min() {
        let range = DelayRange {
            min: Duration::from_millis(100),
            max: Duration::from_millis(100),
        };
        assert_eq!(range.sample(), Duration::from_millis(100));
    }
}
