//! Run and batch span helpers.

use tracing::Span;
use uuid::Uuid;

/// Start the span covering one whole `batch_process` call.
///
/// Outcome fields are declared empty and filled by [`record_run_outcome`].
pub fn start_run_span(run_id: &Uuid, total: usize, batch_size: usize) -> Span {
    tracing::info_span!(
        "batch.run",
        "batch.run_id" = %run_id,
        "batch.total_items" = total,
        "batch.size" = batch_size,
        "batch.succeeded" = tracing::field::Empty,
        "batch.failed" = tracing::field::Empty,
        "batch.aborted" = tracing::field::Empty,
    )
}

/// Start the span for one batch inside a run.
pub fn start_batch_span(current: usize, total_batches: usize, len: usize) -> Span {
    tracing::debug_span!(
        "batch.execute",
        "batch.index" = current,
        "batch.count" = total_batches,
        "batch.len" = len,
    )
}

/// Record the final counts on a run span.
pub fn record_run_outcome(span: &Span, succeeded: usize, failed: usize, aborted: bool) {
    span.record("batch.succeeded", succeeded);
    span.record("batch.failed", failed);
    span.record("batch.aborted", aborted);
}
