//! Batch execution engine.
//!
//! Leaf first: [`delay`] (cancellable sleep), [`retry`] (one item, bounded
//! attempts), [`batch`] (one batch, concurrent fan-out) and
//! [`orchestrator`] (the whole run, batch after batch).

pub mod batch;
pub mod delay;
pub mod orchestrator;
pub mod retry;

pub use batch::{BatchOutcome, execute_batch};
pub use delay::delay;
pub use orchestrator::{batch_process, retry_failed};
pub use retry::execute_with_retry;

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

/// Run a caller-supplied callback, logging instead of unwinding if it panics.
pub(crate) fn invoke_guarded(name: &'static str, f: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
        let reason = panic_message(panic.as_ref());
        error!(callback = name, %reason, "callback panicked; run continues");
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
