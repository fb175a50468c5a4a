//! Per-symbol processing states.

use serde::Serialize;
use std::fmt;

/// Where one symbol is in its processing step.
///
/// ```text
/// Pending ─► Skipped
///    │
///    └─► DirectoryCreated ─► MetadataFetched ─► CalendarAttempted ─► HistoryAttempted ─► Done
///            │                    │
///            └──────► Failed ◄────┘
/// ```
///
/// `Pending` may also go straight to `Failed` when the symbol directory cannot
/// be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolState {
    Pending,
    Skipped,
    DirectoryCreated,
    MetadataFetched,
    CalendarAttempted,
    HistoryAttempted,
    Done,
    Failed,
}

impl SymbolState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SymbolState::Skipped | SymbolState::Done | SymbolState::Failed
        )
    }

    pub fn can_transition_to(self, next: SymbolState) -> bool {
        use SymbolState::*;
        matches!(
            (self, next),
            (Pending, Skipped)
                | (Pending, DirectoryCreated)
                | (Pending, Failed)
                | (DirectoryCreated, MetadataFetched)
                | (DirectoryCreated, Failed)
                | (MetadataFetched, CalendarAttempted)
                | (MetadataFetched, Failed)
                | (CalendarAttempted, HistoryAttempted)
                | (HistoryAttempted, Done)
        )
    }
}

impl fmt::Display for SymbolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolState::Pending => "pending",
            SymbolState::Skipped => "skipped",
            SymbolState::DirectoryCreated => "directory_created",
            SymbolState::MetadataFetched => "metadata_fetched",
            SymbolState::CalendarAttempted => "calendar_attempted",
            SymbolState::HistoryAttempted => "history_attempted",
            SymbolState::Done => "done",
            SymbolState::Failed => "failed",
        };
        f.write_str(s)
    }
}
