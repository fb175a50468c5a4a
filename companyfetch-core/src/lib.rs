//! companyfetch core: provider rows, the market-data provider seam, the Yahoo
//! Finance implementation and history normalization.
//!
//! - Raw and normalized row types
//! - `MarketDataProvider` trait (metadata, calendar, history)
//! - Yahoo provider with retry and circuit breaker
//! - History → history/dividends/splits normalization

pub mod data;

pub use data::{
    normalize, CalendarData, DataError, HistoryRange, MarketDataProvider, Metadata,
    NormalizedHistory, RawRow,
};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: provider-facing types can cross threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<RawRow>();
        require_sync::<RawRow>();
        require_send::<CalendarData>();
        require_sync::<CalendarData>();
        require_send::<NormalizedHistory>();
        require_sync::<NormalizedHistory>();
        require_send::<DataError>();
        require_sync::<DataError>();
        require_send::<data::YahooProvider>();
        require_sync::<data::YahooProvider>();
        require_send::<data::CircuitBreaker>();
        require_sync::<data::CircuitBreaker>();
    }

    /// The provider trait must stay object-safe; the pipeline holds it as `&dyn`.
    #[test]
    fn provider_trait_is_object_safe() {
        fn _takes_dyn(provider: &dyn MarketDataProvider) -> bool {
            provider.is_available()
        }
    }
}
