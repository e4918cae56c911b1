//! Bounded retry for outbound dependency calls
//!
//! Transient failures (timeouts, connection errors, 429/5xx, Neo4j transient
//! codes) are retried with exponential backoff up to `max_retries` extra
//! attempts. Everything else fails on the first attempt.

use crate::config::RetryConfig;
use crate::errors::{AppError, Result};
use backoff::{future::retry_notify, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `op` under the retry policy
///
/// `operation` names the call in log lines.
pub async fn with_retry<T, F, Fut>(policy: &RetryConfig, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(policy.initial_backoff_ms))
        .with_max_interval(Duration::from_millis(policy.max_backoff_ms))
        .with_max_elapsed_time(Some(Duration::from_millis(policy.max_elapsed_ms)))
        .build();

    let max_retries = policy.max_retries;
    let mut attempt: u32 = 0;

    retry_notify(
        backoff,
        || {
            attempt += 1;
            let current = attempt;
            let fut = op();
            async move {
                fut.await.map_err(|e| {
                    if e.is_transient() && current <= max_retries {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        },
        |err: AppError, wait: Duration| {
            warn!(
                operation = operation,
                error = %err,
                retry_in_ms = wait.as_millis() as u64,
                "Transient dependency failure, retrying"
            );
        },
    )
    .await
}
