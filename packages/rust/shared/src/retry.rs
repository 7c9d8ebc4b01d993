//! Retry policy shared by both engines.
//!
//! The two external services are retried with deliberately different delay
//! schemes: the label source with linear per-attempt backoff, the LLM with a
//! short fixed pause. Both are values of the same [`RetryPolicy`] type so the
//! calling code is identical and the schedule stays swappable in tests.

use std::fmt::Display;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// `attempt * base` — grows with the attempt number.
    Linear { base: Duration },
    /// Constant delay between attempts.
    Fixed { delay: Duration },
}

/// How many times to try an operation and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (must be at least 1).
    pub max_attempts: usize,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Linear backoff: sleep `attempt * base` after failed attempt `attempt`.
    pub fn linear(max_attempts: usize, base: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear { base },
        }
    }

    /// Fixed backoff: sleep `delay` after every failed attempt.
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed { delay },
        }
    }

    /// Delay to sleep after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: usize) -> Duration {
        match self.backoff {
            Backoff::Linear { base } => base * attempt as u32,
            Backoff::Fixed { delay } => delay,
        }
    }
}

/// Run `operation` until it succeeds or the policy's attempts are exhausted.
///
/// Returns the first success, or the last error once all attempts are spent.
/// Sleeps between attempts but never after the final one.
pub async fn retry<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "attempt failed, retrying"
                );
                sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
