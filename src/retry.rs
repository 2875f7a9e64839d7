//! Bounded-attempt, fixed-delay retry policy.

use std::time::Duration;

use crate::config;
use crate::error::AttemptError;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then run attempt number `next_attempt`.
    Retry { next_attempt: u32, delay: Duration },
    /// Stop and report the error.
    GiveUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: config::DEFAULT_MAX_ATTEMPTS,
            delay: config::DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the initial attempt; it is clamped to at least one.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Timeouts and rejected candidate commits are final; everything else is retried.
    pub fn is_retryable(err: &AttemptError) -> bool {
        match err {
            AttemptError::Session(err) => !err.is_timeout(),
            AttemptError::Commit(_) => false,
        }
    }

    /// Decides the follow-up for attempt number `attempt` (1-based) that failed with `err`.
    pub fn decide(&self, err: &AttemptError, attempt: u32) -> RetryDecision {
        if Self::is_retryable(err) && attempt < self.max_attempts {
            RetryDecision::Retry {
                next_attempt: attempt + 1,
                delay: self.delay,
            }
        } else {
            RetryDecision::GiveUp
        }
    }
}
