//! One batch: every item in the slice runs concurrently, then joins.

use std::future::Future;

use futures::future::join_all;
use opentelemetry::KeyValue;
use tracing::debug;

use super::retry::execute_with_retry;
use crate::error::OperationError;
use crate::model::{ItemFailure, ItemSuccess, Options, Outcome};
use crate::telemetry::metrics;

/// Outcomes of one batch, partitioned.
#[derive(Debug)]
pub struct BatchOutcome<T, R> {
    pub succeeded: Vec<ItemSuccess<T, R>>,
    pub failed: Vec<ItemFailure<T>>,
    /// Indices whose retry loop was interrupted by cancellation. These items
    /// have no outcome.
    pub cancelled: Vec<usize>,
}

impl<T, R> BatchOutcome<T, R> {
    fn with_capacity(n: usize) -> Self {
        Self {
            succeeded: Vec::with_capacity(n),
            failed: Vec::new(),
            cancelled: Vec::new(),
        }
    }

    /// Items that reached an outcome.
    pub fn resolved(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Run `operation` over `items` concurrently; item `i` carries global index
/// `start_index + i`.
///
/// Resolves only once every item has resolved. A failing item never stops
/// its siblings.
pub async fn execute_batch<T, R, E, F, Fut>(
    items: &[T],
    start_index: usize,
    operation: &F,
    options: &Options<T>,
) -> BatchOutcome<T, R>
where
    T: Clone,
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = std::result::Result<R, E>>,
    E: Into<OperationError>,
{
    let entries = items
        .iter()
        .enumerate()
        .map(|(offset, item)| (start_index + offset, item));
    execute_indexed(entries, operation, options).await
}

/// Same as [`execute_batch`] but with an explicit global index per item.
pub(crate) async fn execute_indexed<'a, T, R, E, F, Fut>(
    entries: impl IntoIterator<Item = (usize, &'a T)>,
    operation: &F,
    options: &Options<T>,
) -> BatchOutcome<T, R>
where
    T: Clone + 'a,
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = std::result::Result<R, E>>,
    E: Into<OperationError>,
{
    let pending: Vec<_> = entries
        .into_iter()
        .map(|(index, item)| async move {
            (index, execute_with_retry(item, index, operation, options).await)
        })
        .collect();

    let mut outcome = BatchOutcome::with_capacity(pending.len());

    for (index, result) in join_all(pending).await {
        match result {
            Ok(Outcome::Success(success)) => {
                metrics::items_processed().add(1, &[KeyValue::new("result", "ok")]);
                outcome.succeeded.push(success);
            }
            Ok(Outcome::Failure(failure)) => {
                metrics::items_processed().add(1, &[KeyValue::new("result", "failed")]);
                outcome.failed.push(failure);
            }
            Err(err) => {
                debug!(index, error = %err, "item stopped before reaching an outcome");
                outcome.cancelled.push(index);
            }
        }
    }

    outcome
}
