//! OHLCV bar representation.
//!
//! A bar carries its raw prices plus any derived indicator columns the
//! annotator appended. A column that is absent on a bar is undefined there
//! (warm-up), never zero.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub indicators: BTreeMap<String, f64>,
}

impl Bar {
    pub fn new(
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: i64,
    ) -> Self {
        Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            indicators: BTreeMap::new(),
        }
    }

    pub fn indicator(&self, column: &str) -> Option<f64> {
        self.indicators.get(column).copied()
    }

    pub fn has_indicator(&self, column: &str) -> bool {
        self.indicators.contains_key(column)
    }

    pub fn set_indicator(&mut self, column: &str, value: f64) {
        self.indicators.insert(column.to_string(), value);
    }

    /// Timestamp rendered the way reports and curves show it.
    pub fn label(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Sort by timestamp and drop duplicate timestamps, keeping the last row seen.
///
/// Providers occasionally repeat the live bar; the simulator needs strictly
/// increasing timestamps.
pub fn normalize_series(mut bars: Vec<Bar>) -> Vec<Bar> {
    bars.sort_by_key(|b| b.timestamp);
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}
