//! Human-facing summaries of a run: compact durations and a JSON failure
//! report listing every failed item by line.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::model::{BatchResult, Progress, Stats};

/// Format milliseconds as `850ms`, `42s` or `3m 7s`.
pub fn format_duration(ms: u64) -> String {
    if ms < 1_000 {
        return format!("{ms}ms");
    }
    if ms < 60_000 {
        return format!("{}s", (ms as f64 / 1_000.0).round() as u64);
    }
    let minutes = ms / 60_000;
    let seconds = ((ms % 60_000) as f64 / 1_000.0).round() as u64;
    format!("{minutes}m {seconds}s")
}

/// One-line progress summary, e.g.
/// `batch 2/4 10/20 (50%) ok=9 failed=1 eta=3s`.
pub fn progress_line(progress: &Progress) -> String {
    let eta = progress
        .estimated_time_remaining_ms
        .map(format_duration)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "batch {}/{} {}/{} ({}%) ok={} failed={} eta={}",
        progress.current_batch,
        progress.total_batches,
        progress.processed,
        progress.total,
        progress.percentage,
        progress.succeeded,
        progress.failed,
        eta,
    )
}

/// Input items with the 1-based line each came from.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NumberedLines {
    pub items: Vec<String>,
    /// `lines[i]` is the input line of `items[i]`.
    pub lines: Vec<usize>,
}

/// Split input into one item per line, optionally dropping blank lines
/// while keeping each surviving item's original line number.
pub fn numbered_lines(content: &str, skip_empty: bool) -> NumberedLines {
    let mut out = NumberedLines::default();
    for (n, line) in content.lines().enumerate() {
        if skip_empty && line.trim().is_empty() {
            continue;
        }
        out.items.push(line.to_string());
        out.lines.push(n + 1);
    }
    out
}

#[derive(Debug, Serialize)]
pub struct FailureEntry<'a, T> {
    /// 1-based input line.
    pub line: usize,
    pub index: usize,
    pub error: &'a str,
    pub attempts: u32,
    pub item: &'a T,
}

/// Serializable summary of a finished run.
#[derive(Debug, Serialize)]
pub struct FailureReport<'a, T> {
    pub generated_at: DateTime<Utc>,
    pub stats: &'a Stats,
    pub aborted: bool,
    pub failures: Vec<FailureEntry<'a, T>>,
}

impl<'a, T: Serialize> FailureReport<'a, T> {
    /// Build a report from `result`, failures ordered by index. Item `i`
    /// is reported on line `i + 1`.
    pub fn new<R>(result: &'a BatchResult<T, R>) -> Self {
        Self::build(result, |index| index + 1)
    }

    /// Like [`new`](Self::new), but `lines[i]` is the line of item `i`.
    pub fn with_lines<R>(result: &'a BatchResult<T, R>, lines: &[usize]) -> Self {
        Self::build(result, |index| lines.get(index).copied().unwrap_or(index + 1))
    }

    fn build<R>(result: &'a BatchResult<T, R>, line_of: impl Fn(usize) -> usize) -> Self {
        let failures = result
            .failed_sorted()
            .into_iter()
            .map(|f| FailureEntry {
                line: line_of(f.index),
                index: f.index,
                error: &f.error,
                attempts: f.attempts,
                item: &f.item,
            })
            .collect();
        Self {
            generated_at: Utc::now(),
            stats: &result.stats,
            aborted: result.aborted,
            failures,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperationError;
    use crate::model::ItemFailure;

    #[test]
    fn durations_pick_a_readable_unit() {
        assert_eq!(format_duration(0), "0ms");
        assert_eq!(format_duration(999), "999ms");
        assert_eq!(format_duration(1_499), "1s");
        assert_eq!(format_duration(42_000), "42s");
        assert_eq!(format_duration(187_000), "3m 7s");
    }

    #[test]
    fn progress_line_shows_eta() {
        let progress = Progress {
            total: 20,
            processed: 10,
            succeeded: 9,
            failed: 1,
            percentage: 50,
            current_batch: 2,
            total_batches: 4,
            elapsed_time_ms: 3_000,
            estimated_time_remaining_ms: Some(3_000),
        };
        assert_eq!(
            progress_line(&progress),
            "batch 2/4 10/20 (50%) ok=9 failed=1 eta=3s"
        );
    }

    #[test]
    fn report_lists_failures_by_line() {
        let failure = |index: usize, error: &str| ItemFailure {
            item: format!("row-{index}"),
            index,
            error: error.to_string(),
            attempts: 2,
            original_error: OperationError::msg(error),
        };
        let result: BatchResult<String, ()> = BatchResult {
            succeeded: Vec::new(),
            failed: vec![failure(3, "late"), failure(1, "early")],
            stats: Stats::new(5, 3, 2, 100),
            aborted: false,
        };

        let json: serde_json::Value =
            serde_json::from_str(&FailureReport::new(&result).to_json().unwrap()).unwrap();

        let failures = json["failures"].as_array().unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0]["line"], 2);
        assert_eq!(failures[0]["error"], "early");
        assert_eq!(failures[1]["item"], "row-3");
        assert_eq!(json["stats"]["failed"], 2);
        assert_eq!(json["aborted"], false);
    }

    #[test]
    fn skipped_blank_lines_keep_original_numbering() {
        let input = numbered_lines("a\n\nb\n   \nc", true);
        assert_eq!(input.items, vec!["a", "b", "c"]);
        assert_eq!(input.lines, vec![1, 3, 5]);

        let kept = numbered_lines("a\n\nb", false);
        assert_eq!(kept.items, vec!["a", "", "b"]);
        assert_eq!(kept.lines, vec![1, 2, 3]);
    }

    #[test]
    fn report_uses_input_line_numbers() {
        let input = numbered_lines("a\n\nb", true);
        let result: BatchResult<String, ()> = BatchResult {
            succeeded: Vec::new(),
            failed: vec![ItemFailure {
                item: input.items[1].clone(),
                index: 1,
                error: "rejected".to_string(),
                attempts: 1,
                original_error: OperationError::msg("rejected"),
            }],
            stats: Stats::new(2, 1, 1, 10),
            aborted: false,
        };

        let report = FailureReport::with_lines(&result, &input.lines);
        assert_eq!(report.failures[0].line, 3);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(*report.failures[0].item, "b");
    }
}
