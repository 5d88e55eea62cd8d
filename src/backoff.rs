// ABOUTME: Retry policy for dial attempts with an exponential backoff default
//
// The pool treats the policy as an external collaborator: it decides how many
// retries a dial gets and how long to wait between them. The dial path only
// reports per-attempt success or failure.

use std::time::Duration;

/// Decides whether and when a failed dial attempt is retried
///
/// `attempt` counts completed failures, starting at 0 for the first one.
/// Returning `None` stops the retry loop and surfaces the last error.
pub trait RetryPolicy: Send + Sync {
    /// Delay before the next attempt, or `None` to give up
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Exponential backoff: `base * 2^attempt`, capped, with a bounded retry
/// count
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// First retry delay
    base: Duration,

    /// Delay cap
    max_delay: Duration,

    /// Retries after the initial attempt
    max_retries: u32,
}

impl ExponentialBackoff {
    /// Create a policy with explicit bounds
    #[must_use]
    pub const fn new(base: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base,
            max_delay,
            max_retries,
        }
    }
}

impl Default for ExponentialBackoff {
    /// 100ms base, 2s cap, 3 retries
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(2), 3)
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }

        // Saturating arithmetic so large attempt counts cannot overflow
        let multiplier = 2_u64.saturating_pow(attempt);
        let base_millis = u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX);
        let delay = Duration::from_millis(base_millis.saturating_mul(multiplier));

        Some(delay.min(self.max_delay))
    }
}
