//! Per-item execution with bounded retries and linear backoff.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, warn};

use super::delay::delay;
use super::{invoke_guarded, panic_message};
use crate::error::{OperationError, Result};
use crate::model::{ItemFailure, ItemSuccess, Options, Outcome};
use crate::telemetry::metrics;

/// Apply `operation` to one item, retrying up to `options.max_retries` times.
///
/// A panicking operation counts as a failed attempt carrying the panic
/// message. Returns the item's terminal [`Outcome`]. An exhausted item is reported to
/// `on_error` before this returns. The only `Err` is
/// [`Error::Cancelled`](crate::error::Error::Cancelled), raised when the
/// token fires during a backoff wait; no further attempt is made then.
pub async fn execute_with_retry<T, R, E, F, Fut>(
    item: &T,
    index: usize,
    operation: &F,
    options: &Options<T>,
) -> Result<Outcome<T, R>>
where
    T: Clone,
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = std::result::Result<R, E>>,
    E: Into<OperationError>,
{
    let max_retries = options.max_retries.max(1);
    let mut last_error = None;

    for attempt in 1..=max_retries {
        metrics::item_attempts().add(1, &[]);

        let call = async {
            operation(item.clone(), index)
                .await
                .map_err(Into::<OperationError>::into)
        };
        let attempt_result = AssertUnwindSafe(call)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(OperationError::msg(format!(
                    "operation panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });

        match attempt_result {
            Ok(result) => {
                if attempt > 1 {
                    debug!(index, attempt, "item succeeded after retry");
                }
                return Ok(Outcome::Success(ItemSuccess {
                    item: item.clone(),
                    result,
                    index,
                }));
            }
            Err(err) => {
                warn!(index, attempt, max_retries, error = %err, "attempt failed");
                last_error = Some(err);

                if attempt < max_retries {
                    delay(options.retry_delay_for(attempt), options.cancel.as_ref()).await?;
                }
            }
        }
    }

    let original_error =
        last_error.unwrap_or_else(|| OperationError::msg("operation was never attempted"));
    let failure = ItemFailure {
        item: item.clone(),
        index,
        error: original_error.message().to_string(),
        attempts: max_retries,
        original_error,
    };

    if let Some(on_error) = &options.on_error {
        invoke_guarded("on_error", || on_error(&failure));
    }

    Ok(Outcome::Failure(failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast<T>() -> Options<T> {
        Options::new().retry_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn single_attempt_when_max_retries_is_one() {
        let calls = AtomicU32::new(0);
        let op = |_: u8, _: usize| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("nope") }
        };

        let outcome = execute_with_retry(&7u8, 0, &op, &fast().max_retries(1))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match outcome {
            Outcome::Failure(f) => assert_eq!(f.attempts, 1),
            Outcome::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn failure_keeps_last_error_message() {
        let calls = AtomicU32::new(0);
        let op = |_: &str, _: usize| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err::<(), _>(format!("failure #{n}")) }
        };

        let outcome = execute_with_retry(&"row", 4, &op, &fast().max_retries(3))
            .await
            .unwrap();

        let Outcome::Failure(f) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(f.index, 4);
        assert_eq!(f.item, "row");
        assert_eq!(f.error, "failure #3");
        assert_eq!(f.attempts, 3);
        assert_eq!(f.original_error.message(), "failure #3");
    }

    #[tokio::test]
    async fn on_error_sees_the_failure() {
        let seen = Arc::new(AtomicU32::new(0));
        let seen_cb = Arc::clone(&seen);
        let opts = fast::<u32>().max_retries(2).on_error(move |f| {
            assert_eq!(f.attempts, 2);
            seen_cb.fetch_add(1, Ordering::SeqCst);
        });
        let op = |_: u32, _: usize| async { Err::<(), _>("bad") };

        execute_with_retry(&1, 0, &op, &opts).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_on_error_does_not_escape() {
        let opts = fast::<u32>()
            .max_retries(1)
            .on_error(|_| panic!("callback blew up"));
        let op = |_: u32, _: usize| async { Err::<(), _>("bad") };

        let outcome = execute_with_retry(&1, 0, &op, &opts).await.unwrap();
        assert!(!outcome.is_success());
    }
}
