//! Exponential backoff for rate-limited model calls.

use std::time::Duration;

/// Longest server-supplied wait honoured before a retry.
pub const MAX_SERVER_HINT: Duration = Duration::from_secs(60);

/// How often and how patiently rate-limited requests are retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Total attempts including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after failed attempt `attempt` (1-based), or `None` when no
    /// attempts remain. A server-supplied hint wins when it is longer, capped
    /// at [`MAX_SERVER_HINT`].
    #[must_use]
    pub fn delay_after(&self, attempt: u32, hint: Option<Duration>) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let backoff = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)));
        Some(hint.map_or(backoff, |hint| hint.min(MAX_SERVER_HINT).max(backoff)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_from_the_base_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1, None), Some(Duration::from_secs(4)));
        assert_eq!(policy.delay_after(2, None), Some(Duration::from_secs(8)));
        assert_eq!(policy.delay_after(3, None), None);
    }

    #[test]
    fn longer_server_hints_win() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_after(1, Some(Duration::from_secs(30))),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            policy.delay_after(1, Some(Duration::from_secs(1))),
            Some(Duration::from_secs(4))
        );
    }

    #[test]
    fn server_hints_are_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_after(1, Some(Duration::from_secs(3600))),
            Some(MAX_SERVER_HINT)
        );
    }

    #[test]
    fn disabled_policy_never_waits() {
        assert_eq!(RetryPolicy::disabled().delay_after(1, None), None);
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }
}
