//! Bounded retry for the write path.
//!
//! Only mutations go through here: reads surface their first error. Sleeps
//! are tokio timers, so an expiring request deadline cancels the wait by
//! dropping the future.

use crate::error::{HavenError, IsRetryable};
use backon::{ExponentialBuilder, Retryable};
use std::time::Duration;
use tracing::debug;

/// 3 attempts total: 200ms, then 400ms between them.
fn write_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_factor(2.0)
        .with_max_times(2)
}

/// Run a mutating store operation, retrying transient backend failures.
/// Permanent errors and exhausted retries are returned untouched.
pub async fn with_write_retries<T, F, Fut>(op: F) -> Result<T, HavenError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, HavenError>>,
{
    op.retry(write_retry_policy())
        .when(|e: &HavenError| e.is_retryable())
        .notify(|err, dur: Duration| {
            debug!("transient db error: {}; retrying after {:?}", err, dur);
        })
        .await
}
