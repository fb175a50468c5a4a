//! Market-data provider trait, raw row types and structured error types.
//!
//! The MarketDataProvider trait abstracts over the external data source so the
//! pipeline can run against Yahoo Finance in production and against a scripted
//! provider in tests. Each symbol needs three independent calls (metadata,
//! calendar, history); every call fails on its own.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raw daily observation from a data provider (before rounding and partitioning).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    /// Exchange-local timestamp of the trading day.
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Dividend amount paid on this day, 0.0 if none.
    pub dividends: f64,
    /// Split ratio effective on this day, 0.0 if none.
    pub stock_splits: f64,
}

/// Company metadata, already normalized to JSON-native values.
pub type Metadata = Map<String, Value>;

/// Calendar payload as it comes back from a provider.
///
/// Providers disagree on the shape of calendar data, so the shape is resolved
/// once at the fetch boundary and flattened to a JSON mapping before anything
/// is persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum CalendarData {
    /// Frame-like data: `rows[i][j]` is the value at `index[i]`, `columns[j]`.
    Tabular {
        columns: Vec<String>,
        index: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    /// Key/value data.
    Mapping(Map<String, Value>),
    /// Anything else, kept as text.
    Opaque(String),
}

impl CalendarData {
    /// Flatten into the mapping that gets written to `calendar.json`.
    ///
    /// Tabular data becomes `{column: {index: value}}`, opaque data
    /// `{"raw": text}`.
    pub fn into_json(self) -> Map<String, Value> {
        match self {
            CalendarData::Mapping(map) => map,
            CalendarData::Opaque(text) => {
                let mut map = Map::new();
                map.insert("raw".into(), Value::String(text));
                map
            }
            CalendarData::Tabular {
                columns,
                index,
                rows,
            } => {
                let mut out = Map::new();
                for (j, column) in columns.iter().enumerate() {
                    let mut cells = Map::new();
                    for (i, label) in index.iter().enumerate() {
                        let cell = rows
                            .get(i)
                            .and_then(|row| row.get(j))
                            .cloned()
                            .unwrap_or(Value::Null);
                        cells.insert(label.clone(), cell);
                    }
                    out.insert(column.clone(), Value::Object(cells));
                }
                out
            }
        }
    }
}

/// How far back to request price history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HistoryRange {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[serde(rename = "10y")]
    TenYears,
    #[serde(rename = "ytd")]
    YearToDate,
    #[default]
    #[serde(rename = "max")]
    Max,
}

impl HistoryRange {
    pub const ALL: [HistoryRange; 11] = [
        HistoryRange::OneDay,
        HistoryRange::FiveDays,
        HistoryRange::OneMonth,
        HistoryRange::ThreeMonths,
        HistoryRange::SixMonths,
        HistoryRange::OneYear,
        HistoryRange::TwoYears,
        HistoryRange::FiveYears,
        HistoryRange::TenYears,
        HistoryRange::YearToDate,
        HistoryRange::Max,
    ];

    /// Provider query value (`range=` parameter).
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryRange::OneDay => "1d",
            HistoryRange::FiveDays => "5d",
            HistoryRange::OneMonth => "1mo",
            HistoryRange::ThreeMonths => "3mo",
            HistoryRange::SixMonths => "6mo",
            HistoryRange::OneYear => "1y",
            HistoryRange::TwoYears => "2y",
            HistoryRange::FiveYears => "5y",
            HistoryRange::TenYears => "10y",
            HistoryRange::YearToDate => "ytd",
            HistoryRange::Max => "max",
        }
    }
}

impl fmt::Display for HistoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|r| r.as_str()).collect();
                format!("unknown history range '{s}'. Valid: {}", valid.join(", "))
            })
    }
}

/// The three per-symbol resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Metadata,
    Calendar,
    History,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Metadata => "metadata",
            Resource::Calendar => "calendar",
            Resource::History => "history",
        };
        f.write_str(name)
    }
}

/// Structured error types for provider calls.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no {resource} data for {symbol}")]
    NoData { symbol: String, resource: Resource },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("data error: {0}")]
    Other(String),
}

/// Trait for market-data providers.
///
/// Implementations perform blocking calls; the pipeline issues them one after
/// another and never concurrently.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Company profile and key statistics.
    fn fetch_metadata(&self, symbol: &str) -> Result<Metadata, DataError>;

    /// Upcoming earnings and dividend dates.
    fn fetch_calendar(&self, symbol: &str) -> Result<CalendarData, DataError>;

    /// Daily rows in chronological order, with dividends and splits merged in.
    fn fetch_history(&self, symbol: &str, range: HistoryRange) -> Result<Vec<RawRow>, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}
