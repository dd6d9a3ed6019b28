//! Exponential backoff for provider calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{LlmError, LlmResult};

/// Retry settings for a provider call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
    /// Growth factor between waits.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (0-based), capped at `max_delay`.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or every retry has been used. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> LlmResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = LlmResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries && err.is_retryable() => {
                    let delay = self.delay_for_retry(attempt);
                    attempt += 1;
                    warn!(
                        task = label,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retryable LLM error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(log_final(label, attempt, err)),
            }
        }
    }
}

fn log_final(label: &str, attempt: u32, err: LlmError) -> LlmError {
    if attempt > 0 {
        warn!(task = label, attempts = attempt + 1, error = %err, "LLM call failed after retries");
    }
    err
}
