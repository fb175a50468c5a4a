//! Fetch pipeline driver.
//!
//! Walks the symbol list in order. For each symbol that is not already
//! complete it waits out the pacing delay, creates the symbol directory, then
//! fetches metadata, calendar and history in that order and writes their
//! artifacts. Only a metadata failure (or a failed directory, info or calendar
//! write) fails the symbol. Calendar and history failures degrade it. No
//! failure stops the run.

use crate::config::FetchConfig;
use crate::pacer::{limiter_for, RateLimiter};
use crate::progress::FetchProgress;
use crate::state::SymbolState;
use crate::stats::{CalendarStatus, HistoryOutcome, RunSummary, SymbolReport};
use crate::symbols::{load_symbols, restrict_to, SymbolListError, SymbolRecord};
use crate::tracker::{mark_complete, CompletionTracker};
use crate::writer::{ArtifactError, ArtifactWriter};
use companyfetch_core::data::{normalize, HistoryRange, MarketDataProvider};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Errors that stop a run before any symbol is processed.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to create output root {}: {source}", path.display())]
    OutputRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Symbols(#[from] SymbolListError),

    #[error("failed to scan completed symbols: {0}")]
    Scan(#[source] ArtifactError),
}

/// Drives one run over a symbol list.
pub struct PipelineDriver<'a> {
    provider: &'a dyn MarketDataProvider,
    tracker: CompletionTracker,
    limiter: Box<dyn RateLimiter + 'a>,
    progress: &'a dyn FetchProgress,
    history_range: HistoryRange,
}

impl<'a> PipelineDriver<'a> {
    pub fn new(
        provider: &'a dyn MarketDataProvider,
        tracker: CompletionTracker,
        limiter: Box<dyn RateLimiter + 'a>,
        progress: &'a dyn FetchProgress,
    ) -> Self {
        Self {
            provider,
            tracker,
            limiter,
            progress,
            history_range: HistoryRange::default(),
        }
    }

    pub fn with_history_range(mut self, range: HistoryRange) -> Self {
        self.history_range = range;
        self
    }

    /// Process every record in order and return the run totals.
    pub fn run(&mut self, records: &[SymbolRecord]) -> RunSummary {
        let started = Instant::now();
        let total = records.len();
        let mut summary = RunSummary::new(total);

        let span = tracing::info_span!(
            "fetch_run",
            provider = self.provider.name(),
            total,
            policy = %self.tracker.policy()
        );
        let _run = span.enter();

        for (index, record) in records.iter().enumerate() {
            let symbol = record.symbol.as_str();
            let _symbol_span = tracing::info_span!("symbol", symbol, index = index + 1).entered();

            if self.tracker.is_complete(symbol) {
                self.progress.on_skip(symbol, index, total);
                summary.record(SymbolReport::skipped(symbol));
                continue;
            }

            self.limiter.acquire();
            self.progress.on_start(symbol, index, total);

            let report = self.process_symbol(symbol);
            self.limiter.release();
            self.progress.on_complete(&report, index, total);

            if report.state == SymbolState::Failed && !self.provider.is_available() {
                tracing::warn!(
                    provider = self.provider.name(),
                    "provider unavailable (circuit breaker open); remaining symbols will fail fast"
                );
            }

            summary.record(report);
        }

        summary.elapsed = started.elapsed();
        self.progress.on_batch_complete(&summary);
        summary
    }

    fn process_symbol(&self, symbol: &str) -> SymbolReport {
        let mut step = SymbolStep::new(symbol);

        let writer = match ArtifactWriter::create(self.tracker.root(), symbol) {
            Ok(writer) => writer,
            Err(e) => return step.fail(e.to_string()),
        };
        step.advance(SymbolState::DirectoryCreated);

        // Metadata failure is fatal for the symbol; the directory is left in place.
        let metadata = match self.provider.fetch_metadata(symbol) {
            Ok(metadata) => metadata,
            Err(e) => return step.fail(format!("Error fetching data for {symbol}: {e}")),
        };
        step.advance(SymbolState::MetadataFetched);

        match writer.write_info(&metadata) {
            Ok(artifact) => step.report.artifacts.push(artifact),
            Err(e) => return step.fail(e.to_string()),
        }

        let calendar = match self.provider.fetch_calendar(symbol) {
            Ok(calendar) => writer
                .write_calendar(calendar)
                .map(|a| (a, CalendarStatus::Written)),
            Err(e) => {
                tracing::warn!(error = %e, "no calendar data for {symbol}");
                writer
                    .write_calendar_unavailable()
                    .map(|a| (a, CalendarStatus::Unavailable))
            }
        };
        match calendar {
            Ok((artifact, status)) => {
                step.report.artifacts.push(artifact);
                step.report.calendar = status;
            }
            Err(e) => return step.fail(e.to_string()),
        }
        step.advance(SymbolState::CalendarAttempted);

        let mut history_rows = 0;
        step.report.history = match self.provider.fetch_history(symbol, self.history_range) {
            Ok(rows) => {
                let normalized = normalize(&rows);
                if normalized.is_empty() {
                    tracing::warn!("no history data for {symbol}");
                    HistoryOutcome::Empty
                } else {
                    match writer.write_history_artifacts(&normalized) {
                        Ok(written) => {
                            step.report.artifacts.extend(written);
                            history_rows = normalized.history.len();
                            HistoryOutcome::Written {
                                rows: normalized.history.len(),
                                dividends: normalized.dividends.len(),
                                splits: normalized.splits.len(),
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to write history for {symbol}");
                            HistoryOutcome::WriteFailed
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch history for {symbol}");
                HistoryOutcome::FetchFailed
            }
        };
        step.advance(SymbolState::HistoryAttempted);

        // A failed artifact write leaves the symbol unmarked so the next run retries it.
        if step.report.history == HistoryOutcome::WriteFailed {
            tracing::warn!("not marking {symbol} complete after a failed write");
        } else {
            match mark_complete(writer.dir(), symbol, &step.report.artifacts, history_rows) {
                Ok(_) => step.report.marked_complete = true,
                Err(e) => tracing::error!(error = %e, "failed to write completion marker"),
            }
        }

        step.advance(SymbolState::Done);
        step.finish()
    }
}

/// Report under construction plus its state transitions.
struct SymbolStep {
    report: SymbolReport,
    started: Instant,
}

impl SymbolStep {
    fn new(symbol: &str) -> Self {
        Self {
            report: SymbolReport::new(symbol),
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: SymbolState) {
        debug_assert!(
            self.report.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.report.state,
            next
        );
        tracing::trace!(from = %self.report.state, to = %next, "state transition");
        self.report.state = next;
    }

    fn fail(mut self, error: String) -> SymbolReport {
        self.advance(SymbolState::Failed);
        self.report.error = Some(error);
        self.finish()
    }

    fn finish(mut self) -> SymbolReport {
        debug_assert!(self.report.state.is_terminal());
        self.report.elapsed = self.started.elapsed();
        self.report
    }
}

/// Resolve paths from `config`, load the symbol list and run the pipeline.
///
/// `only` restricts the run to the listed symbols (list order is kept).
pub fn run_from_config(
    config: &FetchConfig,
    provider: &dyn MarketDataProvider,
    progress: &dyn FetchProgress,
    only: &[String],
) -> Result<RunSummary, PipelineError> {
    let output_root = config.output_root();
    std::fs::create_dir_all(&output_root).map_err(|source| PipelineError::OutputRoot {
        path: output_root.clone(),
        source,
    })?;

    let records = restrict_to(load_symbols(&config.symbols_path())?, only);
    let tracker =
        CompletionTracker::scan(&output_root, config.completion).map_err(PipelineError::Scan)?;

    tracing::info!(
        symbols = records.len(),
        already_complete = tracker.len(),
        output = %output_root.display(),
        "starting fetch run"
    );

    let mut driver = PipelineDriver::new(provider, tracker, limiter_for(config.pacing()), progress)
        .with_history_range(config.provider.history_range);
    Ok(driver.run(&records))
}
