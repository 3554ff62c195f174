//! CSV file data adapter.
//!
//! Reads `<dir>/<SYMBOL>_<interval>.csv` with the header
//! `timestamp,open,high,low,close,volume`.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::domain::error::PatternIqError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, interval: &str) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", symbol.to_uppercase(), interval))
    }
}

/// Accepts `YYYY-MM-DD` (midnight) or a date with minutes or seconds.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn csv_error(reason: String) -> PatternIqError {
    PatternIqError::service("csv", reason)
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, PatternIqError> {
        let path = self.csv_path(symbol, interval);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PatternIqError::NoData {
                    symbol: symbol.to_string(),
                    interval: interval.to_string(),
                });
            }
            Err(e) => return Err(PatternIqError::Io(e)),
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();
        let mut dropped = 0usize;

        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row =
                result.map_err(|e| csv_error(format!("{}: {}", path.display(), e)))?;
            let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
                csv_error(format!(
                    "{} row {}: invalid timestamp '{}'",
                    path.display(),
                    line + 2,
                    row.timestamp
                ))
            })?;
            if timestamp < start || timestamp > end {
                continue;
            }
            match (row.open, row.high, row.low, row.close, row.volume) {
                (Some(open), Some(high), Some(low), Some(close), Some(volume)) => {
                    bars.push(Bar::new(timestamp, open, high, low, close, volume as i64));
                }
                _ => dropped += 1,
            }
        }

        if dropped > 0 {
            tracing::debug!(symbol, interval, dropped, "dropped rows with missing fields");
        }
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}
