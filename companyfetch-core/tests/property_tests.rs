//! Property tests for history normalization.
//!
//! Uses proptest to verify:
//! 1. Rounding idempotence: round2(round2(x)) == round2(x)
//! 2. Partitioning completeness: every row lands in history, and in the event
//!    lists exactly when its dividend / split value is positive
//! 3. Order preservation across all three outputs

use chrono::{Duration, NaiveDate};
use companyfetch_core::data::{normalize, round2, RawRow};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    0.01..5000.0_f64
}

/// Mostly zero, sometimes positive, occasionally negative junk.
fn arb_event_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        6 => Just(0.0),
        3 => 0.001..10.0_f64,
        1 => -1.0..0.0_f64,
    ]
}

fn arb_row() -> impl Strategy<Value = (f64, u64, f64, f64, u32)> {
    (
        arb_price(),
        0..50_000_000u64,
        arb_event_value(),
        arb_event_value(),
        0..24u32,
    )
}

fn build_rows(specs: &[(f64, u64, f64, f64, u32)]) -> Vec<RawRow> {
    let start = NaiveDate::from_ymd_opt(2000, 1, 3).unwrap();
    specs
        .iter()
        .enumerate()
        .map(|(i, &(close, volume, dividends, stock_splits, hour))| RawRow {
            timestamp: (start + Duration::days(i as i64))
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            open: close * 0.99,
            high: close * 1.01,
            low: close * 0.98,
            close,
            volume,
            dividends,
            stock_splits,
        })
        .collect()
}

// ── 1. Rounding ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn round2_is_idempotent(v in -1.0e9..1.0e9_f64) {
        prop_assert_eq!(round2(round2(v)), round2(v));
    }

    #[test]
    fn round2_moves_at_most_half_a_cent(v in -1.0e6..1.0e6_f64) {
        prop_assert!((round2(v) - v).abs() <= 0.005 + 1e-9);
    }
}

// ── 2. Partitioning ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn every_row_is_partitioned(specs in prop::collection::vec(arb_row(), 0..120)) {
        let rows = build_rows(&specs);
        let out = normalize(&rows);

        prop_assert_eq!(out.history.len(), rows.len());

        let expected_divs = rows.iter().filter(|r| r.dividends > 0.0).count();
        let expected_splits = rows.iter().filter(|r| r.stock_splits > 0.0).count();
        prop_assert_eq!(out.dividends.len(), expected_divs);
        prop_assert_eq!(out.splits.len(), expected_splits);

        prop_assert!(out.dividends.iter().all(|d| d.amount > 0.0));
        prop_assert!(out.splits.iter().all(|s| s.ratio > 0.0));
    }

    #[test]
    fn history_values_are_rounded(specs in prop::collection::vec(arb_row(), 1..60)) {
        let out = normalize(&build_rows(&specs));
        for row in &out.history {
            prop_assert_eq!(round2(row.open), row.open);
            prop_assert_eq!(round2(row.high), row.high);
            prop_assert_eq!(round2(row.low), row.low);
            prop_assert_eq!(round2(row.close), row.close);
        }
    }
}

// ── 3. Order preservation ────────────────────────────────────────────

proptest! {
    #[test]
    fn provider_order_is_kept(specs in prop::collection::vec(arb_row(), 0..120)) {
        let rows = build_rows(&specs);
        let out = normalize(&rows);

        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.timestamp.date()).collect();
        let history_dates: Vec<NaiveDate> = out.history.iter().map(|h| h.date).collect();
        prop_assert_eq!(&history_dates, &dates);

        let div_dates: Vec<NaiveDate> = rows
            .iter()
            .filter(|r| r.dividends > 0.0)
            .map(|r| r.timestamp.date())
            .collect();
        let out_div_dates: Vec<NaiveDate> = out.dividends.iter().map(|d| d.date).collect();
        prop_assert_eq!(out_div_dates, div_dates);

        let split_dates: Vec<NaiveDate> = rows
            .iter()
            .filter(|r| r.stock_splits > 0.0)
            .map(|r| r.timestamp.date())
            .collect();
        let out_split_dates: Vec<NaiveDate> = out.splits.iter().map(|s| s.date).collect();
        prop_assert_eq!(out_split_dates, split_dates);
    }

    #[test]
    fn event_close_matches_history_close(specs in prop::collection::vec(arb_row(), 1..60)) {
        let out = normalize(&build_rows(&specs));
        for div in &out.dividends {
            let day = out.history.iter().find(|h| h.date == div.date).unwrap();
            prop_assert_eq!(div.close, day.close);
        }
    }
}
