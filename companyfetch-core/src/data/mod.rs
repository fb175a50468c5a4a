//! Provider access and history normalization.

pub mod circuit_breaker;
pub mod normalize;
pub mod provider;
pub mod schema;
pub mod shape;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use normalize::{normalize, round2, NormalizedHistory};
pub use provider::{
    CalendarData, DataError, HistoryRange, MarketDataProvider, Metadata, RawRow, Resource,
};
pub use schema::{DividendEvent, HistoryRow, SplitEvent};
pub use yahoo::{YahooOptions, YahooProvider, DEFAULT_METADATA_MODULES};
