//! Metric instrument factories for batchrun.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without one, every instrument is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("batchrun")
}

/// Counter: items that reached an outcome.
/// Labels: `result` ("ok" | "failed").
pub fn items_processed() -> Counter<u64> {
    meter()
        .u64_counter("batchrun.items.processed")
        .with_description("Number of items that reached an outcome")
        .build()
}

/// Counter: operation invocations, retries included.
pub fn item_attempts() -> Counter<u64> {
    meter()
        .u64_counter("batchrun.items.attempts")
        .with_description("Number of operation attempts")
        .build()
}

/// Counter: batches fully resolved.
pub fn batches_completed() -> Counter<u64> {
    meter()
        .u64_counter("batchrun.batches.completed")
        .with_description("Number of completed batches")
        .build()
}

/// Histogram: wall-clock duration of one batch.
pub fn batch_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("batchrun.batch.duration_ms")
        .with_description("Batch duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: runs stopped early by cancellation.
pub fn runs_aborted() -> Counter<u64> {
    meter()
        .u64_counter("batchrun.runs.aborted")
        .with_description("Number of runs stopped by cancellation")
        .build()
}
