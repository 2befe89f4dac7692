// src/github/retry.rs
// =============================================================================
// Bounded retry with exponential backoff for GitHub requests.
//
// The retry state is an explicit value (attempt count + next delay) instead
// of nested loops, so a caller can see exactly where it is. Waiting happens
// with tokio::time::sleep, which parks only the current task: other fetches
// keep running while one of them backs off.
//
// Schedule with the defaults: 500ms, 1s, 2s, then give up.
// =============================================================================

use crate::error::FetchError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How hard to try before giving up on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = try once)
    pub max_retries: u32,
    /// Delay before the first retry; doubles after each one
    pub base_delay: Duration,
    /// Upper bound for any single wait, including server-provided hints
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn start(&self) -> RetryState {
        RetryState {
            policy: *self,
            attempt: 0,
            next_delay: self.base_delay,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Where one request is in its retry schedule.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
    next_delay: Duration,
}

impl RetryState {
    /// Retries used so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }

    /// Records a failure and decides whether another attempt is allowed.
    pub fn on_failure(&mut self, error: &FetchError) -> RetryDecision {
        if !error.is_retryable() || self.attempt >= self.policy.max_retries {
            return RetryDecision::GiveUp;
        }

        let delay = match error {
            FetchError::RateLimited {
                retry_after: Some(hint),
            } => *hint,
            _ => self.next_delay,
        }
        .min(self.policy.max_delay);

        self.attempt += 1;
        self.next_delay = self
            .next_delay
            .saturating_mul(2)
            .min(self.policy.max_delay);

        RetryDecision::RetryAfter(delay)
    }
}

/// Runs `operation` until it succeeds, fails for good, or runs out of retries.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut state = policy.start();

    loop {
        match operation().await {
            Ok(value) => {
                if state.attempt() > 0 {
                    debug!(
                        operation = operation_name,
                        attempt = state.attempt(),
                        "request succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => match state.on_failure(&err) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        operation = operation_name,
                        attempt = state.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retryable error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => return Err(err),
            },
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why FnMut() -> Fut instead of passing a future?
//    - A future can only be awaited once
//    - To try again we need a fresh future, so we take something that can
//      make one each time we call it
//
// 2. Why saturating_mul?
//    - Doubling a Duration forever would eventually overflow
//    - saturating_mul stops at the maximum instead of panicking
// -----------------------------------------------------------------------------
