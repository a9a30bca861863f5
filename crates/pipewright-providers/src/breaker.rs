//! Failure-window circuit breaker.
//!
//! Two observable states: closed and open. There is no half-open probe; once the
//! cooldown has elapsed the next check closes the circuit again.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::descriptor::CircuitBreakerPolicy;

/// Window and cooldown are clamped to about ten years.
const MAX_SPAN: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Result of checking the circuit before an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitCheck {
    Closed,
    /// Cooldown elapsed; the circuit just flipped back to closed.
    Reset,
    Open { remaining: Duration },
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: usize,
    window: Duration,
    cooldown: Duration,
    failures: VecDeque<Instant>,
    open_until: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(policy: &CircuitBreakerPolicy) -> Self {
        Self {
            threshold: policy.threshold.max(1) as usize,
            window: Duration::from_secs(policy.window_sec).min(MAX_SPAN),
            cooldown: Duration::from_secs(policy.cooldown_sec).min(MAX_SPAN),
            failures: VecDeque::new(),
            open_until: None,
        }
    }

    pub fn check(&mut self, now: Instant) -> CircuitCheck {
        match self.open_until {
            Some(until) if until > now => CircuitCheck::Open {
                remaining: until - now,
            },
            Some(_) => {
                self.open_until = None;
                self.failures.clear();
                CircuitCheck::Reset
            }
            None => CircuitCheck::Closed,
        }
    }

    /// Record a failed attempt. Returns `true` when this failure opened the circuit.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.failures.push_back(now);
        self.prune(now);
        if self.failures.len() >= self.threshold && !self.is_open(now) {
            self.open_until = Some(now.checked_add(self.cooldown).unwrap_or(now));
            return true;
        }
        false
    }

    /// Record a success. Returns `true` when there was failure state to clear.
    pub fn record_success(&mut self) -> bool {
        let had_state = !self.failures.is_empty() || self.open_until.is_some();
        self.failures.clear();
        self.open_until = None;
        had_state
    }

    pub fn is_open(&self, now: Instant) -> bool {
        self.open_until.is_some_and(|until| until > now)
    }

    /// Failures currently inside the window.
    pub fn recent_failures(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.failures.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.failures.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }
}
