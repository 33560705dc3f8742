//! Linear reconnect backoff with a ceiling.

use std::time::Duration;

/// Delay added per failed attempt.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(15);

/// Longest delay between reconnect attempts.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Reconnect delay policy: `min(attempt * step, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    step: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(step: Duration, max: Duration) -> Self {
        Self { step, max }
    }

    /// Delay before the attempt following `attempt` consecutive failures.
    ///
    /// Attempt 0 connects immediately.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_STEP, DEFAULT_BACKOFF_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let backoff = Backoff::default();
        let delays: Vec<u64> = (0..8).map(|a| backoff.delay_for_attempt(a).as_secs()).collect();
        assert_eq!(delays, vec![0, 15, 30, 45, 60, 60, 60, 60]);
    }

    #[test]
    fn test_large_attempt_does_not_overflow() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay_for_attempt(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_custom_schedule() {
        let backoff = Backoff::new(Duration::from_millis(250), Duration::from_secs(1));
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_millis(750));
        assert_eq!(backoff.delay_for_attempt(9), Duration::from_secs(1));
    }
}
