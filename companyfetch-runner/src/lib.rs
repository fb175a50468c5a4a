//! companyfetch runner: the per-symbol fetch pipeline.
//!
//! This crate builds on `companyfetch-core` to provide:
//! - Symbol list loading
//! - Completion tracking across runs (marker or directory policy)
//! - Artifact writing (`info.json`, `calendar.json`, history CSVs)
//! - Fixed-interval pacing between symbols
//! - The pipeline driver with per-symbol reports and run totals

pub mod config;
pub mod pacer;
pub mod pipeline;
pub mod progress;
pub mod state;
pub mod stats;
pub mod symbols;
pub mod tracker;
pub mod writer;

pub use config::{ConfigError, FetchConfig, ProviderConfig, DEFAULT_CONFIG_FILE};
pub use pacer::{limiter_for, FixedDelay, RateLimiter, Unlimited};
pub use pipeline::{run_from_config, PipelineDriver, PipelineError};
pub use progress::{FetchProgress, TracingProgress};
pub use state::SymbolState;
pub use stats::{CalendarStatus, HistoryOutcome, RunSummary, SymbolReport};
pub use symbols::{load_symbols, SymbolListError, SymbolRecord};
pub use tracker::{
    directory_status, mark_complete, CompletionMarker, CompletionPolicy, CompletionTracker,
    DirectoryStatus, MARKER_FILE,
};
pub use writer::{Artifact, ArtifactError, ArtifactWriter, ARTIFACT_FILES};
