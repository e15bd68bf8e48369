//! Bounded retry policy
//!
//! Startup binding and shutdown unbinding both run a fixed number of attempts.
//! An attempt reports one of three things:
//!
//! - `Ok(Attempt::Done(value))`: the goal is reached, stop
//! - `Ok(Attempt::Again)`: progress was made (an attach or detach was issued),
//!   re-check on the next attempt without sleeping
//! - `Err(error)`: logged, then sleep `delay` before the next attempt
//!
//! Running out of attempts is an outcome, not an error. Callers log it and
//! carry on.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::{Error, Result};

/// Result of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Done(T),
    Again,
}

/// Result of a whole retry run
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded {
        value: T,
        attempts: usize,
    },
    Exhausted {
        attempts: usize,
        /// Error of the last failed attempt, if any attempt failed
        last_error: Option<Error>,
    },
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }

    pub fn attempts(&self) -> usize {
        match self {
            RetryOutcome::Succeeded { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            RetryOutcome::Succeeded { value, .. } => Some(value),
            RetryOutcome::Exhausted { .. } => None,
        }
    }
}

/// Fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (zero exhausts immediately)
    pub attempts: usize,

    /// Sleep after a failed attempt
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: usize, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Run `op` until it reports `Done` or attempts run out
    ///
    /// `op` receives the 1-based attempt number. No sleep follows the final
    /// attempt.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<Attempt<T>>>,
    {
        let mut last_error = None;

        for attempt in 1..=self.attempts {
            match op(attempt).await {
                Ok(Attempt::Done(value)) => {
                    debug!(label, attempt, "Retry run finished");
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    };
                }
                Ok(Attempt::Again) => {
                    debug!(label, attempt, "Progress made, re-checking");
                }
                Err(e) => {
                    warn!(label, attempt, error = %e, "Attempt failed");
                    last_error = Some(e);

                    if attempt < self.attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        match &last_error {
            Some(e) => error!(label, attempts = self.attempts, error = %e, "Retries exhausted"),
            None => error!(label, attempts = self.attempts, "Retries exhausted"),
        }
        RetryOutcome::Exhausted {
            attempts: self.attempts,
            last_error,
        }
    }
}
