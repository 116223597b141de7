//! Bounded re-attempts with exponential backoff around one operation.

use std::{fmt, future::Future, time::Duration};

use rand::Rng;
use tracing::{debug, warn};

use crate::{config::RetryConfig, error::ConfigError};

/// Errors that know whether another attempt could help.
pub trait Retryable {
    fn is_retryable(&self) -> bool {
        true
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptError<E> {
    Failed(E),
    TimedOut(Duration),
}

impl<E> AttemptError<E> {
    fn is_retryable(&self) -> bool
    where
        E: Retryable,
    {
        match self {
            AttemptError::Failed(err) => err.is_retryable(),
            AttemptError::TimedOut(_) => true,
        }
    }
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Failed(err) => err.fmt(f),
            AttemptError::TimedOut(limit) => {
                write!(f, "attempt timed out after {} ms", limit.as_millis())
            }
        }
    }
}

/// Successful value plus the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

/// Terminal failure after the policy gave up.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryExhausted<E> {
    pub last_error: AttemptError<E>,
    pub attempts: u32,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} attempts)", self.last_error, self.attempts)
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryExhausted<E> {}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Un-jittered delay after the `attempt`-th failure:
    /// `min(base * multiplier^(attempt-1), max)`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = (self.config.backoff_base_ms as f64)
            * self.config.backoff_multiplier.powi(exp);
        let capped = scaled.min(self.config.backoff_max_ms as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Sum of the un-jittered delays a caller waits through when every
    /// attempt fails. Jitter only lengthens delays, so this is a lower bound.
    pub fn total_backoff(&self) -> Duration {
        (1..self.config.max_attempts).map(|n| self.base_delay(n)).sum()
    }

    /// Stretches `anchor` by up to `jitter_ratio`, never below `anchor` and
    /// never above `backoff_max_ms`.
    fn jittered(&self, anchor: Duration) -> Duration {
        let ratio = self.config.jitter_ratio;
        let anchor_ms = anchor.as_millis() as f64;
        if ratio <= 0.0 || anchor_ms == 0.0 {
            return anchor;
        }

        let upper = (anchor_ms * (1.0 + ratio)).min(self.config.backoff_max_ms as f64);
        if upper <= anchor_ms {
            return anchor;
        }
        let jittered = rand::rng().random_range(anchor_ms..=upper);
        Duration::from_millis(jittered.round() as u64).max(anchor)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or `max_attempts` is reached. The closure receives the 1-based attempt
    /// number and must build a fresh invocation each time.
    pub async fn execute<T, E, F, Fut>(
        &self,
        mut operation: F,
    ) -> Result<Attempted<T>, RetryExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + fmt::Display,
    {
        let attempt_timeout = self.config.attempt_timeout();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error =
                match tokio::time::timeout(attempt_timeout, operation(attempt)).await {
                    Ok(Ok(value)) => {
                        return Ok(Attempted {
                            value,
                            attempts: attempt,
                        });
                    }
                    Ok(Err(err)) => AttemptError::Failed(err),
                    Err(_) => AttemptError::TimedOut(attempt_timeout),
                };

            if !error.is_retryable() {
                warn!(
                    target: "scan::item",
                    attempt,
                    error = %error,
                    "attempt failed with non-retryable error"
                );
                return Err(RetryExhausted {
                    last_error: error,
                    attempts: attempt,
                });
            }

            if attempt >= self.config.max_attempts {
                warn!(
                    target: "scan::item",
                    attempts = attempt,
                    error = %error,
                    "retries exhausted"
                );
                return Err(RetryExhausted {
                    last_error: error,
                    attempts: attempt,
                });
            }

            let delay = self.jittered(self.base_delay(attempt));
            debug!(
                target: "scan::item",
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "attempt failed, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
