//! Tick feeds for the runner.
//!
//! Two sources:
//! 1. Long-format CSV (`timestamp,symbol,close,volume`), one row per symbol
//!    per timestamp, grouped into ticks and sorted by time
//! 2. Synthetic random walk, seeded per symbol, for development and tests
//!
//! Synthetic feeds are tagged so results produced on them can be told apart.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use rand::Rng;
use serde::Deserialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use ticktape_core::domain::{BarQuote, Tick};
use ticktape_core::rng::SeedTree;
use tracing::info;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: unparseable timestamp '{value}'")]
    Timestamp { row: usize, value: String },
    #[error("row {row}: duplicate bar for '{symbol}' at {timestamp}")]
    DuplicateBar {
        row: usize,
        symbol: String,
        timestamp: DateTime<Utc>,
    },
    #[error("feed contains no rows")]
    Empty,
    #[error("synthetic bar step must be positive, got {0}")]
    Step(Duration),
    #[error("synthetic timestamp overflows at bar {index}")]
    TimeRange { index: usize },
}

/// A materialized feed plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedFeed {
    /// Ticks in strictly increasing timestamp order.
    pub ticks: Vec<Tick>,
    /// Every symbol seen in the feed, sorted.
    pub symbols: Vec<String>,
    /// BLAKE3 over all bar data.
    pub dataset_hash: String,
    pub synthetic: bool,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    symbol: String,
    close: f64,
    volume: f64,
}

/// Load a long-format CSV file.
pub fn load_csv(path: &Path) -> Result<LoadedFeed, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let feed = parse_csv(file)?;
    info!(
        path = %path.display(),
        ticks = feed.ticks.len(),
        symbols = feed.symbols.len(),
        "loaded feed"
    );
    Ok(feed)
}

/// Parse long-format CSV from any reader.
///
/// Rows may arrive in any order. Bar values are not validated here; the
/// backtest loop rejects insane bars when it reaches them.
pub fn parse_csv<R: Read>(reader: R) -> Result<LoadedFeed, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut by_time: BTreeMap<DateTime<Utc>, Tick> = BTreeMap::new();
    let mut symbols = BTreeSet::new();

    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        // Header is row 1
        let line = i + 2;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            row: line,
            value: row.timestamp.clone(),
        })?;
        let tick = by_time
            .entry(timestamp)
            .or_insert_with(|| Tick::new(timestamp));
        match tick.bars.entry(row.symbol.clone()) {
            Entry::Occupied(_) => {
                return Err(LoadError::DuplicateBar {
                    row: line,
                    symbol: row.symbol,
                    timestamp,
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(BarQuote::new(row.close, row.volume));
            }
        }
        symbols.insert(row.symbol);
    }

    if by_time.is_empty() {
        return Err(LoadError::Empty);
    }
    let ticks: Vec<Tick> = by_time.into_values().collect();
    Ok(LoadedFeed {
        dataset_hash: dataset_hash(&ticks),
        ticks,
        symbols: symbols.into_iter().collect(),
        synthetic: false,
    })
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a bare date (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

/// Write ticks back out in the long CSV format, symbols in sorted order.
pub fn write_csv<W: Write>(ticks: &[Tick], writer: W) -> Result<(), LoadError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["timestamp", "symbol", "close", "volume"])?;
    for tick in ticks {
        let ts = tick.timestamp.to_rfc3339();
        for (symbol, bar) in &tick.bars {
            let close = bar.close.to_string();
            let volume = bar.volume.to_string();
            wtr.write_record([ts.as_str(), symbol.as_str(), close.as_str(), volume.as_str()])?;
        }
    }
    wtr.flush().map_err(|e| LoadError::Csv(e.into()))?;
    Ok(())
}

/// Deterministic random-walk feed.
///
/// Each symbol starts at 100.0 and moves by a uniform step in ±2% per bar.
/// Each symbol draws from its own stream derived from `seed`, so adding a
/// symbol does not change the others' paths. Fails if `step` is not
/// positive or a timestamp falls outside chrono's range.
pub fn synthetic_ticks(
    symbols: &[String],
    start: DateTime<Utc>,
    step: Duration,
    count: usize,
    seed: u64,
) -> Result<LoadedFeed, LoadError> {
    if step <= Duration::zero() {
        return Err(LoadError::Step(step));
    }
    let tree = SeedTree::new(seed);
    let mut ticks: Vec<Tick> = Vec::with_capacity(count);
    let mut timestamp = start;
    for index in 0..count {
        if index > 0 {
            timestamp = timestamp
                .checked_add_signed(step)
                .ok_or(LoadError::TimeRange { index })?;
        }
        ticks.push(Tick::new(timestamp));
    }

    for symbol in symbols {
        let mut rng = tree.rng_for(symbol, 0);
        let mut price = 100.0_f64;
        for tick in &mut ticks {
            let step_return: f64 = rng.gen_range(-0.02..0.02);
            price *= 1.0 + step_return;
            let volume = rng.gen_range(500_000..5_000_000u64) as f64;
            tick.bars.insert(symbol.clone(), BarQuote::new(price, volume));
        }
    }

    let mut sorted: Vec<String> = symbols.to_vec();
    sorted.sort();
    sorted.dedup();
    Ok(LoadedFeed {
        dataset_hash: dataset_hash(&ticks),
        ticks,
        symbols: sorted,
        synthetic: true,
    })
}

/// BLAKE3 over timestamps and bar values, in tick then symbol order.
pub fn dataset_hash(ticks: &[Tick]) -> String {
    let mut hasher = blake3::Hasher::new();
    for tick in ticks {
        hasher.update(&tick.timestamp.timestamp_micros().to_le_bytes());
        for (symbol, bar) in &tick.bars {
            hasher.update(symbol.as_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = "\
timestamp,symbol,close,volume
2024-01-03,AAPL,101.5,1200
2024-01-02,MSFT,370.0,900
2024-01-02,AAPL,100.0,1000
2024-01-03,MSFT,372.5,950
";

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap()
    }

    #[test]
    fn groups_rows_into_sorted_ticks() {
        let feed = parse_csv(SAMPLE.as_bytes()).unwrap();
        assert_eq!(feed.ticks.len(), 2);
        assert_eq!(feed.symbols, vec!["AAPL", "MSFT"]);
        assert!(!feed.synthetic);

        let first = &feed.ticks[0];
        assert_eq!(first.timestamp, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
        assert_eq!(first.bar("AAPL").unwrap().close, 100.0);
        assert_eq!(first.bar("MSFT").unwrap().volume, 900.0);
        assert_eq!(feed.ticks[1].bar("AAPL").unwrap().close, 101.5);
    }

    #[test]
    fn timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-02T14:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T09:30:00-05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 14:30:00"), Some(expected));
        assert!(parse_timestamp("2024-01-02").is_some());
        assert!(parse_timestamp("Jan 2").is_none());
    }

    #[test]
    fn rejects_bad_timestamp_with_row_number() {
        let csv = "timestamp,symbol,close,volume\n2024-01-02,AAPL,1,1\nnope,AAPL,1,1\n";
        match parse_csv(csv.as_bytes()) {
            Err(LoadError::Timestamp { row, value }) => {
                assert_eq!(row, 3);
                assert_eq!(value, "nope");
            }
            other => panic!("expected timestamp error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicate_bars() {
        let csv = "timestamp,symbol,close,volume\n2024-01-02,AAPL,1,1\n2024-01-02,AAPL,2,2\n";
        assert!(matches!(
            parse_csv(csv.as_bytes()),
            Err(LoadError::DuplicateBar { .. })
        ));
    }

    #[test]
    fn rejects_empty_and_malformed() {
        assert!(matches!(
            parse_csv("timestamp,symbol,close,volume\n".as_bytes()),
            Err(LoadError::Empty)
        ));
        let csv = "timestamp,symbol,close,volume\n2024-01-02,AAPL,abc,1\n";
        assert!(matches!(parse_csv(csv.as_bytes()), Err(LoadError::Csv(_))));
    }

    #[test]
    fn write_then_parse_preserves_feed() {
        let symbols = vec!["SPY".to_string(), "QQQ".to_string()];
        let feed = synthetic_ticks(&symbols, start(), Duration::minutes(5), 20, 1).unwrap();
        let mut buf = Vec::new();
        write_csv(&feed.ticks, &mut buf).unwrap();
        let parsed = parse_csv(buf.as_slice()).unwrap();
        assert_eq!(parsed.ticks, feed.ticks);
        assert_eq!(parsed.dataset_hash, feed.dataset_hash);
    }

    #[test]
    fn synthetic_feed_is_deterministic_and_tagged() {
        let symbols = vec!["SPY".to_string()];
        let a = synthetic_ticks(&symbols, start(), Duration::days(1), 50, 42).unwrap();
        let b = synthetic_ticks(&symbols, start(), Duration::days(1), 50, 42).unwrap();
        assert_eq!(a.ticks, b.ticks);
        assert_eq!(a.dataset_hash, b.dataset_hash);
        assert!(a.synthetic);
        assert!(a.ticks.iter().all(|t| t.bar("SPY").unwrap().is_sane()));

        let c = synthetic_ticks(&symbols, start(), Duration::days(1), 50, 43).unwrap();
        assert_ne!(a.dataset_hash, c.dataset_hash);
    }

    #[test]
    fn synthetic_paths_independent_per_symbol() {
        let one = synthetic_ticks(&["SPY".into()], start(), Duration::days(1), 30, 7).unwrap();
        let both = vec!["SPY".to_string(), "QQQ".to_string()];
        let two = synthetic_ticks(&both, start(), Duration::days(1), 30, 7).unwrap();
        for (a, b) in one.ticks.iter().zip(&two.ticks) {
            assert_eq!(a.bar("SPY"), b.bar("SPY"));
        }
        assert_ne!(two.ticks[5].bar("SPY"), two.ticks[5].bar("QQQ"));
    }

    #[test]
    fn synthetic_timestamps_past_chrono_range_fail() {
        let symbols = vec!["SPY".to_string()];
        let late = Utc.from_utc_datetime(&NaiveDateTime::MAX) - Duration::days(3);
        match synthetic_ticks(&symbols, late, Duration::days(1), 10, 1) {
            Err(LoadError::TimeRange { index }) => assert_eq!(index, 4),
            other => panic!("expected time range error, got {other:?}"),
        }
        assert_eq!(
            synthetic_ticks(&symbols, late, Duration::days(1), 4, 1)
                .unwrap()
                .ticks
                .len(),
            4
        );
    }

    #[test]
    fn synthetic_long_spans_keep_increasing() {
        let symbols = vec!["SPY".to_string()];
        let feed = synthetic_ticks(&symbols, start(), Duration::weeks(1), 5_000, 3).unwrap();
        assert!(feed.ticks.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(
            feed.ticks[4_999].timestamp - feed.ticks[0].timestamp,
            Duration::weeks(4_999)
        );
    }

    #[test]
    fn synthetic_rejects_nonpositive_step() {
        let symbols = vec!["SPY".to_string()];
        assert!(matches!(
            synthetic_ticks(&symbols, start(), Duration::zero(), 5, 1),
            Err(LoadError::Step(_))
        ));
    }
}
