//! Bounded retry with randomized delay.
//!
//! Every attempt waits a uniformly random delay in `[min_delay, max_delay]`.
//! The delay does not grow with the attempt number: retries are few, and
//! spreading them out is what keeps concurrent loops from hitting the store
//! in lockstep.

use std::time::Duration;

/// Retry settings for one step of a sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Lower bound of the delay between attempts.
    pub min_delay: Duration,
    /// Upper bound of the delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Create a policy. Bounds given in the wrong order are swapped.
    pub fn new(max_attempts: u32, min_delay: Duration, max_delay: Duration) -> Self {
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };
        Self {
            max_attempts: max_attempts.max(1),
            min_delay,
            max_delay,
        }
    }

    /// Whether another attempt is allowed after `failed` failed attempts.
    pub fn should_retry(&self, failed: u32) -> bool {
        failed < self.max_attempts
    }

    /// A random delay inside the configured bounds.
    pub fn delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        let span = max - min;
        if span == 0 {
            return self.min_delay;
        }
        Duration::from_millis(min + random_u64() % (span + 1))
    }
}

fn random_u64() -> u64 {
    let mut bytes = [0u8; 8];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_stays_within_bounds() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_millis(300));
        for _ in 0..200 {
            let delay = policy.delay();
            assert!(delay >= Duration::from_millis(100), "{delay:?}");
            assert!(delay <= Duration::from_millis(300), "{delay:?}");
        }
    }

    #[test]
    fn delay_is_randomized() {
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::from_millis(5000));
        let delays: Vec<_> = (0..20).map(|_| policy.delay()).collect();
        let min = delays.iter().min().unwrap();
        let max = delays.iter().max().unwrap();
        assert!(
            max.as_millis() - min.as_millis() >= 100,
            "expected variance, got min={:?} max={:?}",
            min,
            max
        );
    }

    #[test]
    fn fixed_delay_when_bounds_equal() {
        let policy = RetryPolicy::new(2, Duration::from_millis(50), Duration::from_millis(50));
        assert_eq!(policy.delay(), Duration::from_millis(50));
    }

    #[test]
    fn retries_are_bounded() {
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::ZERO);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn swapped_bounds_are_normalized() {
        let policy = RetryPolicy::new(0, Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(policy.min_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(2));
        assert_eq!(policy.max_attempts, 1);
    }
}
