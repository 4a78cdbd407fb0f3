//! Year/month partitioner.
//!
//! Turns a raw bar sequence into disjoint (year, month) groups:
//! - rows with unparseable timestamps are dropped and counted
//! - survivors are sorted by timestamp ascending (stable) and exact
//!   duplicate rows collapse to one
//! - each emitted row is the `YYYY-MM-DD` date string plus the feature
//!   columns; the venue tag and the raw timestamp do not survive

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::data::RawBar;

/// Timestamp shapes accepted at the partition boundary.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Emitted date column format.
pub const DATE_FMT: &str = "%Y-%m-%d";

/// Calendar bucket a bar falls into, derived solely from its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    pub year: i32,
    /// 1..=12
    pub month: u32,
}

impl PartitionKey {
    /// File name for this bucket under its year directory: `07.csv`.
    pub fn file_name(&self) -> String {
        format!("{:02}.csv", self.month)
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// One output row: human-readable date plus the feature columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionRow {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Ordered rows sharing one (year, month).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionGroup {
    pub rows: Vec<PartitionRow>,
}

/// Groups in ascending (year, month) order plus the count of rows dropped
/// for unparseable timestamps.
#[derive(Debug, Default)]
pub struct Partitioned {
    pub groups: BTreeMap<PartitionKey, PartitionGroup>,
    pub dropped_rows: usize,
}

/// Partition raw bars by calendar (year, month).
///
/// Empty input yields an empty mapping, not an error.
pub fn partition(records: &[RawBar]) -> Partitioned {
    let mut stamped: Vec<(NaiveDateTime, &RawBar)> = Vec::with_capacity(records.len());
    let mut dropped_rows = 0usize;

    for record in records {
        match parse_timestamp(&record.timestamp) {
            Some(ts) => stamped.push((ts, record)),
            None => dropped_rows += 1,
        }
    }

    // Stable sort keeps input order for equal stamps, so exact duplicates
    // end up adjacent and collapse below.
    stamped.sort_by_key(|(ts, _)| *ts);
    stamped.dedup_by(|a, b| a.0 == b.0 && a.1 == b.1);

    let mut groups: BTreeMap<PartitionKey, PartitionGroup> = BTreeMap::new();
    for (ts, record) in stamped {
        let key = PartitionKey {
            year: ts.year(),
            month: ts.month(),
        };
        groups.entry(key).or_default().rows.push(PartitionRow {
            date: ts.format(DATE_FMT).to_string(),
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        });
    }

    Partitioned {
        groups,
        dropped_rows,
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    // Date-only stamps count as midnight.
    NaiveDate::parse_from_str(raw, DATE_FMT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(timestamp: &str, close: f64) -> RawBar {
        RawBar {
            timestamp: timestamp.to_string(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 10.0,
            symbol: Some("BINANCE:BTCUSD".into()),
        }
    }

    #[test]
    fn groups_by_year_and_month() {
        let records = vec![
            bar("2022-07-01 00:00:00", 1.0),
            bar("2022-07-02 00:00:00", 2.0),
            bar("2022-08-01 00:00:00", 3.0),
            bar("2023-01-15 00:00:00", 4.0),
        ];

        let out = partition(&records);

        assert_eq!(out.dropped_rows, 0);
        let keys: Vec<PartitionKey> = out.groups.keys().copied().collect();
        assert_eq!(
            keys,
            vec![
                PartitionKey { year: 2022, month: 7 },
                PartitionKey { year: 2022, month: 8 },
                PartitionKey { year: 2023, month: 1 },
            ]
        );
        assert_eq!(out.groups[&keys[0]].rows.len(), 2);
        assert_eq!(out.groups[&keys[0]].rows[0].date, "2022-07-01");
    }

    #[test]
    fn unparseable_timestamps_are_dropped_and_counted() {
        let records = vec![
            bar("2022-07-01 00:00:00", 1.0),
            bar("not a date", 2.0),
            bar("1704153600000", 3.0),
        ];

        let out = partition(&records);

        assert_eq!(out.dropped_rows, 2);
        assert_eq!(out.groups.len(), 1);
    }

    #[test]
    fn rows_sorted_ascending_within_group() {
        let records = vec![
            bar("2022-07-03 00:00:00", 3.0),
            bar("2022-07-01 00:00:00", 1.0),
            bar("2022-07-02 00:00:00", 2.0),
        ];

        let out = partition(&records);
        let group = &out.groups[&PartitionKey { year: 2022, month: 7 }];
        let dates: Vec<&str> = group.rows.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, vec!["2022-07-01", "2022-07-02", "2022-07-03"]);
    }

    #[test]
    fn exact_duplicates_collapse() {
        let records = vec![
            bar("2022-07-01 00:00:00", 1.0),
            bar("2022-07-01 00:00:00", 1.0),
        ];

        let out = partition(&records);
        let group = &out.groups[&PartitionKey { year: 2022, month: 7 }];
        assert_eq!(group.rows.len(), 1);
    }

    #[test]
    fn same_stamp_different_rows_both_survive() {
        let records = vec![
            bar("2022-07-01 00:00:00", 1.0),
            bar("2022-07-01 00:00:00", 2.0),
        ];

        let out = partition(&records);
        let group = &out.groups[&PartitionKey { year: 2022, month: 7 }];
        assert_eq!(group.rows.len(), 2);
        // Equal stamps keep input order.
        assert_eq!(group.rows[0].close, 1.0);
        assert_eq!(group.rows[1].close, 2.0);
    }

    #[test]
    fn date_only_stamps_are_accepted() {
        let records = vec![bar("2022-07-01", 1.0), bar("2022-07-02T12:30:00", 2.0)];
        let out = partition(&records);
        assert_eq!(out.dropped_rows, 0);
        let group = &out.groups[&PartitionKey { year: 2022, month: 7 }];
        assert_eq!(group.rows.len(), 2);
    }

    #[test]
    fn empty_input_yields_empty_mapping() {
        let out = partition(&[]);
        assert!(out.groups.is_empty());
        assert_eq!(out.dropped_rows, 0);
    }

    #[test]
    fn key_display_and_file_name() {
        let key = PartitionKey { year: 2022, month: 7 };
        assert_eq!(key.to_string(), "2022-07");
        assert_eq!(key.file_name(), "07.csv");
    }
}
