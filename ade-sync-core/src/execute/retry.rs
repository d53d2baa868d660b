use std::time::Duration;

use crate::error::SyncError;

/// Bounded exponential backoff for transient destination errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt, not total attempts.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`,
    /// capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        2u32.checked_pow(retry - 1)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Delay before retrying after `error`. A server-provided retry-after is
    /// honoured when it is longer than the backoff.
    pub fn delay_for(&self, error: &SyncError, retry: u32) -> Duration {
        let backoff = self.backoff(retry);
        match error {
            SyncError::RateLimited(retry_after) => backoff.max(*retry_after),
            _ => backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_cap() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=8).map(|n| policy.backoff(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    }

    #[test]
    fn test_backoff_does_not_overflow() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(200), Duration::from_secs(60));
    }

    #[test]
    fn test_rate_limit_uses_longer_of_retry_after_and_backoff() {
        let policy = RetryPolicy::default();
        let short = SyncError::RateLimited(Duration::from_millis(200));
        let long = SyncError::RateLimited(Duration::from_secs(30));

        assert_eq!(policy.delay_for(&short, 3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(&long, 3), Duration::from_secs(30));
        assert_eq!(
            policy.delay_for(&SyncError::DestinationUnavailable("503".into()), 2),
            Duration::from_secs(2)
        );
    }
}
