//! Per-symbol reports and run totals.

use crate::state::SymbolState;
use crate::writer::Artifact;
use serde::Serialize;
use std::time::Duration;

/// What ended up in `calendar.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarStatus {
    NotAttempted,
    Written,
    /// Fetch failed; the error marker was written instead.
    Unavailable,
}

/// What happened to the history step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum HistoryOutcome {
    NotAttempted,
    Written {
        rows: usize,
        dividends: usize,
        splits: usize,
    },
    /// Provider returned no rows.
    Empty,
    FetchFailed,
    WriteFailed,
}

/// Result of processing one symbol.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub state: SymbolState,
    pub calendar: CalendarStatus,
    pub history: HistoryOutcome,
    pub artifacts: Vec<Artifact>,
    pub marked_complete: bool,
    pub error: Option<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SymbolReport {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            state: SymbolState::Pending,
            calendar: CalendarStatus::NotAttempted,
            history: HistoryOutcome::NotAttempted,
            artifacts: Vec::new(),
            marked_complete: false,
            error: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn skipped(symbol: impl Into<String>) -> Self {
        Self {
            state: SymbolState::Skipped,
            ..Self::new(symbol)
        }
    }

    /// Done, but with a missing calendar or missing history artifacts.
    pub fn is_degraded(&self) -> bool {
        self.state == SymbolState::Done
            && (self.calendar != CalendarStatus::Written
                || !matches!(self.history, HistoryOutcome::Written { .. }))
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Subset of `done`.
    pub degraded: usize,
    pub reports: Vec<SymbolReport>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, report: SymbolReport) {
        match report.state {
            SymbolState::Skipped => self.skipped += 1,
            SymbolState::Failed => self.failed += 1,
            SymbolState::Done => {
                self.done += 1;
                if report.is_degraded() {
                    self.degraded += 1;
                }
            }
            other => {
                tracing::warn!(symbol = %report.symbol, state = %other, "recorded non-terminal symbol");
            }
        }
        self.reports.push(report);
    }

    pub fn failures(&self) -> impl Iterator<Item = &SymbolReport> {
        self.reports
            .iter()
            .filter(|r| r.state == SymbolState::Failed)
    }

    /// Percentage of attempted (non-skipped) symbols that reached `Done`.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.done + self.failed;
        if attempted == 0 {
            0.0
        } else {
            (self.done as f64 / attempted as f64) * 100.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            total = self.total,
            done = self.done,
            skipped = self.skipped,
            failed = self.failed,
            degraded = self.degraded,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "fetch run complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done(symbol: &str, calendar: CalendarStatus, history: HistoryOutcome) -> SymbolReport {
        SymbolReport {
            state: SymbolState::Done,
            calendar,
            history,
            ..SymbolReport::new(symbol)
        }
    }

    #[test]
    fn counters_follow_terminal_state() {
        let written = HistoryOutcome::Written {
            rows: 2,
            dividends: 0,
            splits: 0,
        };
        let mut summary = RunSummary::new(4);
        summary.record(done("A", CalendarStatus::Written, written));
        summary.record(done("B", CalendarStatus::Unavailable, written));
        summary.record(SymbolReport::skipped("C"));
        summary.record(SymbolReport {
            state: SymbolState::Failed,
            error: Some("boom".into()),
            ..SymbolReport::new("D")
        });

        assert_eq!(summary.done, 2);
        assert_eq!(summary.degraded, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failures().count(), 1);
        assert_eq!(summary.reports.iter().find(|r| r.symbol == "B").map(|r| r.calendar), Some(CalendarStatus::Unavailable));
        assert!((summary.success_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn empty_history_is_degraded() {
        let report = done("A", CalendarStatus::Written, HistoryOutcome::Empty);
        assert!(report.is_degraded());
        assert!(!SymbolReport::skipped("B").is_degraded());
    }

    #[test]
    fn empty_run_has_zero_rate() {
        assert_eq!(RunSummary::new(0).success_rate(), 0.0);
    }
}
