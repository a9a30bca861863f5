//! Backoff policies shared by node retries and provider retries.

use std::time::Duration;

/// Backoff policy controlling the delay between retry attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffPolicy {
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff: base * 2^attempt, capped at max.
    Exponential { base: Duration, max: Duration },
    /// No delay between retries.
    None,
}

impl BackoffPolicy {
    /// Compute the delay after the given failed attempt (0-indexed), i.e. the
    /// `n`-th attempt (1-indexed) waits `delay_for_attempt(n - 1)` before attempt
    /// `n + 1`.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        match self {
            BackoffPolicy::Fixed(d) => *d,
            BackoffPolicy::Exponential { base, max } => {
                let factor = 2u64.saturating_pow(attempt.min(32) as u32);
                let millis = (base.as_millis() as u64).saturating_mul(factor);
                Duration::from_millis(millis).min(*max)
            }
            BackoffPolicy::None => Duration::ZERO,
        }
    }
}

impl Default for BackoffPolicy {
    /// `200ms · 2^(attempt-1)`, capped at 30 seconds.
    fn default() -> Self {
        BackoffPolicy::Exponential {
            base: Duration::from_millis(200),
            max: Duration::from_secs(30),
        }
    }
}
