//! Bounded retry and polling
//!
//! Polls an async operation until it succeeds, the attempt budget runs out,
//! or a cancellation flag is raised. The first attempt runs immediately; the
//! policy's interval is slept between attempts, never after the last one.

use rand::Rng;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// How the delay between attempts evolves
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay every time
    Fixed,
    /// Delay grows by `multiplier`, capped at `max_interval`, with 0.5x-1.5x jitter
    Exponential { multiplier: f64, max_interval: Duration },
}

/// Attempt budget and spacing for a retried operation
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub interval: Duration,
    pub backoff: Backoff,
}

/// Why a retried operation gave up
#[derive(Debug, Error)]
pub enum RetryError<E: fmt::Display> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E: fmt::Display> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts } => *attempts,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: Backoff::Fixed,
        }
    }

    pub fn exponential(max_attempts: u32, initial: Duration, max_interval: Duration) -> Self {
        Self {
            max_attempts,
            interval: initial,
            backoff: Backoff::Exponential {
                multiplier: 2.0,
                max_interval,
            },
        }
    }

    /// Delay to sleep after the given (1-based) failed attempt
    fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential {
                multiplier,
                max_interval,
            } => {
                let exponent = attempt.saturating_sub(1).min(64) as i32;
                let base = (self.interval.as_secs_f64() * multiplier.powi(exponent))
                    .min(max_interval.as_secs_f64());
                let jitter = rand::thread_rng().gen_range(0.5..1.5);
                Duration::from_secs_f64(base * jitter)
            }
        }
    }

    /// Retry `operation` until it succeeds or the budget is spent
    pub async fn run<F, Fut, T, E>(&self, name: &str, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run_observed(name, None, |_, _| {}, operation).await
    }

    /// Like [`RetryPolicy::run`], but stops early once `cancel` is set
    pub async fn run_cancellable<F, Fut, T, E>(
        &self,
        name: &str,
        cancel: &AtomicBool,
        operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.run_observed(name, Some(cancel), |_, _| {}, operation).await
    }

    /// Full form: optional cancellation plus a callback for every failed attempt
    pub async fn run_observed<F, Fut, T, E, O>(
        &self,
        name: &str,
        cancel: Option<&AtomicBool>,
        mut on_failure: O,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: fmt::Display,
        O: FnMut(u32, &E),
    {
        let is_cancelled = || cancel.is_some_and(|flag| flag.load(Ordering::SeqCst));
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            if is_cancelled() {
                debug!(operation = %name, attempt, "Retry cancelled");
                return Err(RetryError::Cancelled { attempts: attempt });
            }

            attempt += 1;
            match operation().await {
                Ok(value) => {
                    debug!(operation = %name, attempt, "Operation succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    on_failure(attempt, &e);

                    if attempt >= max_attempts {
                        warn!(
                            operation = %name,
                            attempt,
                            error = %e,
                            "Operation failed after max attempts"
                        );
                        return Err(RetryError::Exhausted { attempts: attempt, last: e });
                    }

                    let delay = self.delay_after(attempt);
                    debug!(
                        operation = %name,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Operation not ready, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
