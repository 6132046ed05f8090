//! Drives a whole run: sequential batches, progress, inter-batch pauses and
//! cooperative cancellation.

use std::collections::HashSet;
use std::future::Future;

use tokio::time::Instant;
use tracing::{Instrument, debug, info};
use uuid::Uuid;

use super::batch::{BatchOutcome, execute_batch, execute_indexed};
use super::delay::delay;
use super::invoke_guarded;
use crate::error::{OperationError, Result};
use crate::model::{BatchResult, Options, Progress, Stats, estimate_remaining_ms, percentage};
use crate::telemetry::metrics;
use crate::telemetry::run::{record_run_outcome, start_batch_span, start_run_span};

/// Process `items` through `operation` in batches of `options.batch_size`.
///
/// Batches run strictly one after another; items within a batch run
/// concurrently. Item failures are recorded, never propagated: the only
/// `Err` is [`Error::InvalidOptions`](crate::error::Error::InvalidOptions).
/// Cancellation stops the run between batches (or during a backoff) and
/// returns what finished so far with `aborted = true`.
pub async fn batch_process<T, R, E, F, Fut>(
    items: &[T],
    operation: F,
    options: &Options<T>,
) -> Result<BatchResult<T, R>>
where
    T: Clone,
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = std::result::Result<R, E>>,
    E: Into<OperationError>,
{
    run(items, None, &operation, options).await
}

/// Re-run only the failed items of `previous`, keeping their original indices.
///
/// Items that succeed move to `succeeded`; items that fail again replace
/// their old failure record. Failures the retry never reached (because it
/// was cancelled) are carried over unchanged.
pub async fn retry_failed<T, R, E, F, Fut>(
    previous: BatchResult<T, R>,
    operation: F,
    options: &Options<T>,
) -> Result<BatchResult<T, R>>
where
    T: Clone,
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = std::result::Result<R, E>>,
    E: Into<OperationError>,
{
    let BatchResult {
        mut succeeded,
        failed,
        stats,
        aborted,
    } = previous;

    let indices: Vec<usize> = failed.iter().map(|f| f.index).collect();
    let items: Vec<T> = failed.iter().map(|f| f.item.clone()).collect();
    info!(count = items.len(), "retrying failed items");

    let retry = run(&items, Some(indices.as_slice()), &operation, options).await?;

    let resolved: HashSet<usize> = retry
        .succeeded
        .iter()
        .map(|s| s.index)
        .chain(retry.failed.iter().map(|f| f.index))
        .collect();

    succeeded.extend(retry.succeeded);
    let mut still_failed = retry.failed;
    still_failed.extend(failed.into_iter().filter(|f| !resolved.contains(&f.index)));

    let stats = Stats::new(
        stats.total,
        succeeded.len(),
        still_failed.len(),
        stats.duration_ms + retry.stats.duration_ms,
    );

    Ok(BatchResult {
        succeeded,
        failed: still_failed,
        stats,
        aborted: aborted || retry.aborted,
    })
}

impl<T: Clone, R> BatchResult<T, R> {
    /// See [`retry_failed`].
    pub async fn retry_failed<E, F, Fut>(self, operation: F, options: &Options<T>) -> Result<Self>
    where
        F: Fn(T, usize) -> Fut,
        Fut: Future<Output = std::result::Result<R, E>>,
        E: Into<OperationError>,
    {
        retry_failed(self, operation, options).await
    }
}

/// `indices[i]` is the global index of `items[i]`; `None` means identity.
async fn run<T, R, E, F, Fut>(
    items: &[T],
    indices: Option<&[usize]>,
    operation: &F,
    options: &Options<T>,
) -> Result<BatchResult<T, R>>
where
    T: Clone,
    F: Fn(T, usize) -> Fut,
    Fut: Future<Output = std::result::Result<R, E>>,
    E: Into<OperationError>,
{
    options.validate()?;

    let total = items.len();
    let batch_size = options.batch_size;
    let total_batches = total.div_ceil(batch_size);
    let run_id = Uuid::new_v4();
    let run_span = start_run_span(&run_id, total, batch_size);

    let result = async {
        let started = Instant::now();
        let mut succeeded = Vec::with_capacity(total);
        let mut failed = Vec::new();
        let mut aborted = false;

        for batch_index in 0..total_batches {
            let current_batch = batch_index + 1;

            if options.is_cancelled() {
                info!(current_batch, total_batches, "run cancelled before batch");
                aborted = true;
                break;
            }

            let start = batch_index * batch_size;
            let end = (start + batch_size).min(total);
            let batch = &items[start..end];
            debug!(current_batch, total_batches, len = batch.len(), "processing batch");

            let batch_span = start_batch_span(current_batch, total_batches, batch.len());
            let batch_started = Instant::now();
            let outcome: BatchOutcome<T, R> = match indices {
                Some(indices) => {
                    let entries = indices[start..end].iter().copied().zip(batch);
                    execute_indexed(entries, operation, options)
                        .instrument(batch_span)
                        .await
                }
                None => {
                    execute_batch(batch, start, operation, options)
                        .instrument(batch_span)
                        .await
                }
            };
            metrics::batches_completed().add(1, &[]);
            metrics::batch_duration_ms()
                .record(batch_started.elapsed().as_secs_f64() * 1000.0, &[]);

            let interrupted = !outcome.cancelled.is_empty();
            succeeded.extend(outcome.succeeded);
            failed.extend(outcome.failed);

            let processed = succeeded.len() + failed.len();
            let elapsed_time_ms = started.elapsed().as_millis() as u64;
            let progress = Progress {
                total,
                processed,
                succeeded: succeeded.len(),
                failed: failed.len(),
                percentage: percentage(processed, total),
                current_batch,
                total_batches,
                elapsed_time_ms,
                estimated_time_remaining_ms: estimate_remaining_ms(
                    elapsed_time_ms,
                    processed,
                    total,
                ),
            };
            if let Some(on_progress) = &options.on_progress {
                invoke_guarded("on_progress", || on_progress(&progress));
            }

            if interrupted {
                info!(current_batch, total_batches, "run cancelled during retry backoff");
                aborted = true;
                break;
            }

            if current_batch < total_batches
                && !options.batch_delay.is_zero()
                && delay(options.batch_delay, options.cancel.as_ref())
                    .await
                    .is_err()
            {
                info!(current_batch, total_batches, "run cancelled between batches");
                aborted = true;
                break;
            }
        }

        let stats = Stats::new(
            total,
            succeeded.len(),
            failed.len(),
            started.elapsed().as_millis() as u64,
        );
        info!(
            %run_id,
            total = stats.total,
            succeeded = stats.succeeded,
            failed = stats.failed,
            duration_ms = stats.duration_ms,
            aborted,
            "run finished"
        );
        if aborted {
            metrics::runs_aborted().add(1, &[]);
        }

        BatchResult {
            succeeded,
            failed,
            stats,
            aborted,
        }
    }
    .instrument(run_span.clone())
    .await;

    record_run_outcome(
        &run_span,
        result.stats.succeeded,
        result.stats.failed,
        result.aborted,
    );
    Ok(result)
}
