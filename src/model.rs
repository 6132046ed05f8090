//! Core data model.
//!
//! Everything here lives for exactly one run: created when
//! [`batch_process`](crate::engine::batch_process) starts and handed back to
//! the caller inside [`BatchResult`] when it returns.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, OperationError, Result};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);

/// Called once per completed batch.
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// Called once per item that exhausted its retries.
pub type ErrorCallback<T> = Arc<dyn Fn(&ItemFailure<T>) + Send + Sync>;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Per-run configuration.
pub struct Options<T> {
    /// Items executed concurrently per batch. Must be at least 1.
    pub batch_size: usize,
    /// Attempts per item, including the first. Must be at least 1.
    pub max_retries: u32,
    /// Base backoff. Attempt `n` waits `retry_delay * n` before attempt `n + 1`.
    pub retry_delay: Duration,
    /// Pause between batches. Zero disables it.
    pub batch_delay: Duration,
    pub on_progress: Option<ProgressCallback>,
    pub on_error: Option<ErrorCallback<T>>,
    pub cancel: Option<CancellationToken>,
}

impl<T> Options<T> {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            batch_delay: DEFAULT_BATCH_DELAY,
            on_progress: None,
            on_error: None,
            cancel: None,
        }
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn batch_delay(mut self, batch_delay: Duration) -> Self {
        self.batch_delay = batch_delay;
        self
    }

    pub fn on_progress(mut self, f: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&ItemFailure<T>) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Reject option values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidOptions("batch_size must be at least 1".into()));
        }
        if self.max_retries == 0 {
            return Err(Error::InvalidOptions("max_retries must be at least 1".into()));
        }
        Ok(())
    }

    /// Backoff charged after failed attempt `attempt` (1-based). Linear.
    pub fn retry_delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }
}

impl<T> Default for Options<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Options<T> {
    fn clone(&self) -> Self {
        Self {
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            batch_delay: self.batch_delay,
            on_progress: self.on_progress.clone(),
            on_error: self.on_error.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> fmt::Debug for Options<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("batch_size", &self.batch_size)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("batch_delay", &self.batch_delay)
            .field("on_progress", &self.on_progress.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// An item whose operation succeeded.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSuccess<T, R> {
    pub item: T,
    pub result: R,
    /// Position in the caller's original sequence.
    pub index: usize,
}

/// An item whose operation failed on every attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure<T> {
    pub item: T,
    pub index: usize,
    /// Message of the last attempt's error.
    pub error: String,
    pub attempts: u32,
    #[serde(skip)]
    pub original_error: OperationError,
}

/// Terminal result of one item.
#[derive(Debug, Clone)]
pub enum Outcome<T, R> {
    Success(ItemSuccess<T, R>),
    Failure(ItemFailure<T>),
}

impl<T, R> Outcome<T, R> {
    pub fn index(&self) -> usize {
        match self {
            Outcome::Success(s) => s.index,
            Outcome::Failure(f) => f.index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Snapshot emitted after every batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub total: usize,
    /// Items attempted so far (succeeded + failed, cumulative).
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// `round(processed / total * 100)`.
    pub percentage: u8,
    /// 1-based.
    pub current_batch: usize,
    pub total_batches: usize,
    pub elapsed_time_ms: u64,
    /// `None` until at least one item was processed.
    pub estimated_time_remaining_ms: Option<u64>,
}

impl Progress {
    pub fn is_final(&self) -> bool {
        self.current_batch == self.total_batches
    }
}

/// Whole-number percentage, rounded half up.
pub fn percentage(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed as f64 / total as f64) * 100.0).round().min(100.0) as u8
}

/// Projected remaining time from the average time per processed item.
pub fn estimate_remaining_ms(elapsed_ms: u64, processed: usize, total: usize) -> Option<u64> {
    if processed == 0 {
        return None;
    }
    let per_item = elapsed_ms as f64 / processed as f64;
    let remaining = total.saturating_sub(processed) as f64;
    Some((per_item * remaining).round() as u64)
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Aggregate timing and counts for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
    /// `duration_ms / total`, over every item requested, processed or not.
    pub average_time_per_item_ms: f64,
}

impl Stats {
    pub fn new(total: usize, succeeded: usize, failed: usize, duration_ms: u64) -> Self {
        let average_time_per_item_ms = if total == 0 {
            0.0
        } else {
            duration_ms as f64 / total as f64
        };
        Self {
            total,
            succeeded,
            failed,
            duration_ms,
            average_time_per_item_ms,
        }
    }
}

/// Final return value of a run.
///
/// `succeeded` and `failed` are in completion order, not index order; use
/// the `*_sorted` helpers when original ordering matters.
#[derive(Debug, Clone)]
pub struct BatchResult<T, R> {
    pub succeeded: Vec<ItemSuccess<T, R>>,
    pub failed: Vec<ItemFailure<T>>,
    pub stats: Stats,
    /// True iff cancellation stopped the run before every item had an outcome.
    pub aborted: bool,
}

impl<T, R> BatchResult<T, R> {
    pub fn succeeded_sorted(&self) -> Vec<&ItemSuccess<T, R>> {
        let mut out: Vec<_> = self.succeeded.iter().collect();
        out.sort_by_key(|s| s.index);
        out
    }

    pub fn failed_sorted(&self) -> Vec<&ItemFailure<T>> {
        let mut out: Vec<_> = self.failed.iter().collect();
        out.sort_by_key(|f| f.index);
        out
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        let mut out: Vec<_> = self.failed.iter().map(|f| f.index).collect();
        out.sort_unstable();
        out
    }

    /// Every requested item has an outcome and the run was not cancelled.
    pub fn is_complete(&self) -> bool {
        !self.aborted && self.succeeded.len() + self.failed.len() == self.stats.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts: Options<()> = Options::default();
        assert_eq!(opts.batch_size, 10);
        assert_eq!(opts.max_retries, 3);
        assert_eq!(opts.retry_delay, Duration::from_millis(1000));
        assert_eq!(opts.batch_delay, Duration::from_millis(100));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn zero_batch_size_or_retries_is_rejected() {
        assert!(Options::<()>::new().batch_size(0).validate().is_err());
        assert!(Options::<()>::new().max_retries(0).validate().is_err());
    }

    #[test]
    fn backoff_is_linear() {
        let opts = Options::<()>::new().retry_delay(Duration::from_millis(100));
        assert_eq!(opts.retry_delay_for(1), Duration::from_millis(100));
        assert_eq!(opts.retry_delay_for(2), Duration::from_millis(200));
        assert_eq!(opts.retry_delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn percentage_rounds() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(10, 10), 100);
    }

    #[test]
    fn eta_uses_average_per_item() {
        assert_eq!(estimate_remaining_ms(0, 0, 10), None);
        assert_eq!(estimate_remaining_ms(500, 5, 20), Some(1500));
        assert_eq!(estimate_remaining_ms(500, 20, 20), Some(0));
    }

    #[test]
    fn average_covers_all_requested_items() {
        let stats = Stats::new(4, 1, 0, 100);
        assert_eq!(stats.average_time_per_item_ms, 25.0);
        assert_eq!(Stats::new(0, 0, 0, 5).average_time_per_item_ms, 0.0);
    }
}
