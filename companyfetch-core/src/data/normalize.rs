//! Raw provider rows → cleaned history plus dividend and split events.
//!
//! Downstream consumers key on the trading day and expect currency-rounded
//! prices, so timestamps are truncated to the calendar day and OHLC values are
//! rounded to 2 decimal places. Dividend and split columns move out of the
//! history into their own event lists. Provider order is kept everywhere.

use super::provider::RawRow;
use super::schema::{DividendEvent, HistoryRow, SplitEvent};

/// The three derived artifacts for one symbol.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedHistory {
    pub history: Vec<HistoryRow>,
    pub dividends: Vec<DividendEvent>,
    pub splits: Vec<SplitEvent>,
}

impl NormalizedHistory {
    /// True when the provider returned no rows at all.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

/// Round to 2 decimal places. Exact halves go to the even cent.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Normalize raw rows into history, dividends and splits.
pub fn normalize(rows: &[RawRow]) -> NormalizedHistory {
    let mut out = NormalizedHistory {
        history: Vec::with_capacity(rows.len()),
        ..Default::default()
    };

    for row in rows {
        let date = row.timestamp.date();
        let close = round2(row.close);

        out.history.push(HistoryRow {
            date,
            open: round2(row.open),
            high: round2(row.high),
            low: round2(row.low),
            close,
            volume: row.volume,
        });

        if row.dividends > 0.0 {
            out.dividends.push(DividendEvent {
                date,
                close,
                amount: row.dividends,
            });
        }

        if row.stock_splits > 0.0 {
            out.splits.push(SplitEvent {
                date,
                close,
                ratio: row.stock_splits,
            });
        }
    }

    out
}
