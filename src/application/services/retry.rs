use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

/// Bounded retry with exponential backoff. Every attempt runs under its own
/// timeout and a timeout counts as a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_factor: f64,
    pub max_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_backoff: Duration::from_secs(30),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AttemptError<E> {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("{0}")]
    Failed(E),
}

#[derive(Debug, Clone, Error)]
#[error("{operation} gave up after {attempts} attempt(s): {last}")]
pub struct RetryExhausted<E> {
    pub operation: String,
    pub attempts: u32,
    pub last: AttemptError<E>,
}

impl RetryPolicy {
    /// Fails on the first attempt, no waiting.
    pub fn no_retry(attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            attempt_timeout,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_factor.max(1.0).powi(exponent);
        let capped = secs.min(self.max_backoff.as_secs_f64());

        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_backoff
        }
    }

    pub async fn run<T, E, F, Fut, R>(
        &self,
        operation: &str,
        is_retryable: R,
        mut attempt: F,
    ) -> Result<T, RetryExhausted<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let error = match tokio::time::timeout(self.attempt_timeout, attempt()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => AttemptError::Failed(e),
                Err(_) => AttemptError::TimedOut(self.attempt_timeout),
            };

            let permanent = matches!(&error, AttemptError::Failed(e) if !is_retryable(e));
            if permanent || attempts >= max_attempts {
                return Err(RetryExhausted {
                    operation: operation.to_string(),
                    attempts,
                    last: error,
                });
            }

            let backoff = self.backoff_for(attempts);
            warn!(
                operation,
                attempt = attempts,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Attempt failed, retrying"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}
