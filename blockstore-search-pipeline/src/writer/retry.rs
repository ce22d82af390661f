//! Bounded retry with backoff.
//!
//! [`retry_with_policy`] wraps any fallible async operation. It knows nothing
//! about batches or search indexes: the caller supplies the operation and the
//! predicate deciding which errors are transient.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Constant(Duration),
    /// Delay doubles after every retry, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay before retry number `retry` (1 for the first retry).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Backoff::Constant(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Limit for a single attempt. An attempt that runs over counts as a
    /// transient failure.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::Constant(DEFAULT_BACKOFF),
            attempt_timeout: Some(DEFAULT_ATTEMPT_TIMEOUT),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
            attempt_timeout: None,
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// A policy that tries once.
    pub fn no_retry() -> Self {
        Self::new(1, Backoff::Constant(Duration::ZERO))
    }
}

/// Why a retried operation gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// A non-transient error; no further attempts were made.
    Permanent { attempt: u32, error: E },
    /// Every allowed attempt failed transiently. Holds the last error.
    Exhausted { attempts: u32, error: E },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent { attempt, .. } => *attempt,
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Permanent { error, .. } | RetryError::Exhausted { error, .. } => error,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
///
/// # Arguments
///
/// * `policy` - Attempt limit and backoff schedule
/// * `is_transient` - Decides whether an error is worth another attempt
/// * `operation` - Called with the 1-based attempt number
///
/// Only the calling task sleeps between attempts.
pub async fn retry_with_policy<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_transient: P,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                if !is_transient(&error) {
                    debug!(attempt, error = %error, "Non-retryable error encountered");
                    return Err(RetryError::Permanent { attempt, error });
                }

                // Don't wait after the last attempt
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        error,
                    });
                }

                let delay = policy.backoff.delay(attempt);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
