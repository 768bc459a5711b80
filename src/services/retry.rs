//! Re-run read-modify-write cycles that lost an optimistic-lock race.

use std::future::Future;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::RetryConfig;

/// Exponential backoff for [`DomainError::ConcurrencyConflict`].
///
/// Only conflicts are retried. Every other error is returned on the spot,
/// since re-reading would not change its outcome.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.initial_backoff_ms, config.max_backoff_ms)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        let initial_backoff = Duration::from_millis(initial_backoff_ms.max(1));
        Self {
            max_retries,
            initial_backoff,
            max_backoff: Duration::from_millis(max_backoff_ms).max(initial_backoff),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `operation` until it succeeds, fails for a reason other than a
    /// conflict, or has been retried `max_retries` times.
    ///
    /// `operation` must redo its reads on every call; resuming from state
    /// captured by an earlier attempt would write stale data.
    pub async fn execute<F, Fut, T>(&self, name: &str, mut operation: F) -> DomainResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        let schedule = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(self.max_backoff)
            .with_max_elapsed_time(None)
            .build();

        let max_retries = self.max_retries;
        let mut attempt: u32 = 0;

        let result = backoff::future::retry(schedule, || {
            let current = attempt;
            attempt = attempt.saturating_add(1);
            let fut = operation();
            async move {
                fut.await.map_err(|err| {
                    if err.is_conflict() && current < max_retries {
                        debug!(operation = name, attempt = current + 1, error = %err, "conflict, retrying");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        })
        .await;

        if let Err(err @ DomainError::ConcurrencyConflict { .. }) = &result {
            warn!(operation = name, attempts = attempt, error = %err, "giving up after repeated conflicts");
        }
        result
    }
}
