//! # batchrun
//!
//! Resilient batch execution for async per-item operations.
//!
//! Items are processed in sequential batches of bounded size. Within a batch
//! every item runs concurrently; failed attempts are retried with linear
//! backoff. Progress snapshots (with ETA) are emitted after each batch, and a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) stops the run
//! cooperatively. The caller gets back every outcome, partitioned into
//! successes and failures, plus timing stats.
//!
//! ```no_run
//! use batchrun::engine::batch_process;
//! use batchrun::model::Options;
//!
//! # async fn demo() -> batchrun::error::Result<()> {
//! let rows = vec!["a", "b", "c"];
//! let options = Options::new()
//!     .batch_size(2)
//!     .on_progress(|p| eprintln!("{}%", p.percentage));
//! let result = batch_process(&rows, |row, _index| async move {
//!     Ok::<_, String>(row.len())
//! }, &options).await?;
//! assert_eq!(result.stats.total, 3);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod report;
pub mod telemetry;
