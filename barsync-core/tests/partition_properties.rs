//! Property tests for the partitioner invariants.
//!
//! Uses proptest to verify:
//! 1. Every group's rows share exactly the group's (year, month)
//! 2. The union of all groups equals the input minus unparseable rows
//! 3. Keys enumerate ascending and rows are sorted within each group

use chrono::{Datelike, Duration, NaiveDate};
use proptest::prelude::*;

use barsync_core::data::RawBar;
use barsync_core::partition::partition;

// ── Strategies (proptest) ────────────────────────────────────────────

/// A bar with either a valid stamp (day offset from 2020-01-01) or one of
/// a few unparseable stamps.
fn arb_bar() -> impl Strategy<Value = RawBar> {
    let valid = (0u32..2000, 1.0f64..100_000.0).prop_map(|(offset, close)| {
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Duration::days(offset as i64);
        RawBar {
            timestamp: format!("{date} 00:00:00"),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1.0,
            symbol: Some("BINANCE:BTCUSD".into()),
        }
    });
    let invalid = prop_oneof![
        Just("garbage".to_string()),
        Just("1704153600000".to_string()),
        Just("07/01/2022".to_string()),
    ]
    .prop_map(|timestamp| RawBar {
        timestamp,
        open: 0.0,
        high: 0.0,
        low: 0.0,
        close: 0.0,
        volume: 0.0,
        symbol: None,
    });
    prop_oneof![4 => valid, 1 => invalid]
}

proptest! {
    /// Every row landed in the group whose key matches its date.
    #[test]
    fn rows_match_their_group_key(records in prop::collection::vec(arb_bar(), 0..200)) {
        let out = partition(&records);

        for (key, group) in &out.groups {
            prop_assert!(!group.rows.is_empty());
            for row in &group.rows {
                let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").unwrap();
                prop_assert_eq!(date.year(), key.year);
                prop_assert_eq!(date.month(), key.month);
            }
        }
    }

    /// The union of all groups is the input minus dropped rows (duplicates
    /// collapse, so compare as sets of rows).
    #[test]
    fn union_equals_parseable_input(records in prop::collection::vec(arb_bar(), 0..200)) {
        let out = partition(&records);

        let parseable = records
            .iter()
            .filter(|r| !r.timestamp.contains('/') && r.timestamp.contains('-'))
            .count();
        prop_assert_eq!(out.dropped_rows, records.len() - parseable);

        let emitted: usize = out.groups.values().map(|g| g.rows.len()).sum();
        prop_assert!(emitted <= parseable);

        // Every parseable input date appears somewhere in the output.
        for record in &records {
            if let Some(date) = record.timestamp.split(' ').next() {
                if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok() {
                    let found = out
                        .groups
                        .values()
                        .flat_map(|g| &g.rows)
                        .any(|row| row.date == date && row.close == record.close);
                    prop_assert!(found, "input row for {} missing from output", date);
                }
            }
        }
    }

    /// Keys ascend and rows within each group are date-sorted.
    #[test]
    fn ordering_invariants_hold(records in prop::collection::vec(arb_bar(), 0..200)) {
        let out = partition(&records);

        let keys: Vec<_> = out.groups.keys().collect();
        for pair in keys.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }

        for group in out.groups.values() {
            for pair in group.rows.windows(2) {
                prop_assert!(pair[0].date <= pair[1].date);
            }
        }
    }
}
