//! Token-bucket admission.

use std::time::{Duration, Instant};

use crate::descriptor::RateLimitPolicy;

/// Token bucket with burst `capacity` and a steady `refill_per_sec` rate.
///
/// Time is passed in explicitly so callers (and tests) control the clock.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket.
    pub fn new(policy: &RateLimitPolicy, now: Instant) -> Self {
        let capacity = f64::from(policy.capacity.max(1));
        Self {
            capacity,
            refill_per_sec: policy.refill_per_sec.max(f64::MIN_POSITIVE),
            tokens: capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Take one token if available.
    pub fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until the next token becomes available (zero if one is available now).
    pub fn wait_time(&mut self, now: Instant) -> Duration {
        self.refill(now);
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_per_sec)
        }
    }

    pub fn available(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(capacity: u32, refill_per_sec: f64) -> RateLimitPolicy {
        RateLimitPolicy {
            capacity,
            refill_per_sec,
        }
    }

    #[test]
    fn burst_up_to_capacity_then_blocks() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(&policy(3, 1.0), t0);
        assert!(bucket.try_take(t0));
        assert!(bucket.try_take(t0));
        assert!(bucket.try_take(t0));
        assert!(!bucket.try_take(t0));
    }

    #[test]
    fn refills_at_steady_rate() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(&policy(1, 2.0), t0);
        assert!(bucket.try_take(t0));
        assert!(!bucket.try_take(t0 + Duration::from_millis(200)));
        assert!(bucket.try_take(t0 + Duration::from_millis(600)));
    }

    #[test]
    fn never_exceeds_capacity() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(&policy(2, 10.0), t0);
        let later = t0 + Duration::from_secs(60);
        assert_eq!(bucket.available(later), 2.0);
    }

    #[test]
    fn wait_time_reports_time_to_next_token() {
        let t0 = Instant::now();
        let mut bucket = TokenBucket::new(&policy(1, 4.0), t0);
        assert_eq!(bucket.wait_time(t0), Duration::ZERO);
        assert!(bucket.try_take(t0));
        assert_eq!(bucket.wait_time(t0), Duration::from_millis(250));
    }
}
