//! Progress callbacks for a fetch run.

use crate::stats::{CalendarStatus, HistoryOutcome, RunSummary, SymbolReport};
use crate::state::SymbolState;

/// Progress callback for multi-symbol runs. Indexes are zero-based.
pub trait FetchProgress: Send {
    /// Called before a symbol is processed.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called instead of `on_start` for a symbol that is already complete.
    fn on_skip(&self, symbol: &str, index: usize, total: usize);

    /// Called when a processed symbol reaches `Done` or `Failed`.
    fn on_complete(&self, report: &SymbolReport, index: usize, total: usize);

    /// Called once the whole list has been walked.
    fn on_batch_complete(&self, summary: &RunSummary);
}

/// Reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl FetchProgress for TracingProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        tracing::info!("[{}/{}] Processing: {symbol}", index + 1, total);
    }

    fn on_skip(&self, symbol: &str, index: usize, total: usize) {
        tracing::info!("[{}/{}] Skipping {symbol}, already fetched", index + 1, total);
    }

    fn on_complete(&self, report: &SymbolReport, _index: usize, _total: usize) {
        let elapsed_ms = report.elapsed.as_millis() as u64;
        match report.state {
            SymbolState::Failed => tracing::error!(
                symbol = %report.symbol,
                error = report.error.as_deref().unwrap_or("unknown error"),
                elapsed_ms,
                "FAIL: {}",
                report.symbol
            ),
            _ if report.is_degraded() => tracing::warn!(
                symbol = %report.symbol,
                calendar = calendar_label(report.calendar),
                history = history_label(report.history),
                elapsed_ms,
                "PARTIAL: {}",
                report.symbol
            ),
            _ => tracing::info!(
                symbol = %report.symbol,
                files = report.artifacts.len(),
                elapsed_ms,
                "OK: {}",
                report.symbol
            ),
        }
    }

    fn on_batch_complete(&self, summary: &RunSummary) {
        summary.log_summary();
    }
}

fn calendar_label(status: CalendarStatus) -> &'static str {
    match status {
        CalendarStatus::NotAttempted => "not attempted",
        CalendarStatus::Written => "written",
        CalendarStatus::Unavailable => "unavailable",
    }
}

fn history_label(outcome: HistoryOutcome) -> &'static str {
    match outcome {
        HistoryOutcome::NotAttempted => "not attempted",
        HistoryOutcome::Written { .. } => "written",
        HistoryOutcome::Empty => "empty",
        HistoryOutcome::FetchFailed => "fetch failed",
        HistoryOutcome::WriteFailed => "write failed",
    }
}
