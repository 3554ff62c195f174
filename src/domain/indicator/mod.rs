//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values
//!
//! All formulas are causal: the value at bar `i` only reads bars `0..=i`.

pub mod ema;
pub mod macd;
pub mod pivot;
pub mod rsi;
pub mod sma;

pub use ema::calculate_ema;
pub use macd::calculate_macd;
pub use pivot::{calculate_resistance, calculate_support};
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

use crate::domain::ohlcv::Bar;
use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Resistance(usize),
    Support(usize),
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Largest period accepted from any untrusted source.
pub const MAX_PERIOD: usize = 10_000;

/// Whether `n` is a usable indicator period.
pub fn valid_period(n: usize) -> bool {
    (1..=MAX_PERIOD).contains(&n)
}

impl IndicatorType {
    /// Resolve a catalog name as emitted by the interpretation service.
    ///
    /// Accepts the bare names `RSI` and `MACD` (default parameters) and the
    /// parameterised forms `SMA_50`, `EMA_20`, `RSI_7`, `MACD_12_26_9`.
    /// Matching is case-insensitive. Unknown names, and periods outside
    /// `1..=MAX_PERIOD`, yield `None`.
    pub fn from_name(name: &str) -> Option<IndicatorType> {
        let upper = name.trim().to_uppercase().replace(['-', ' '], "_");
        let mut parts = upper.split('_').filter(|p| !p.is_empty());
        let head = parts.next()?;
        let params: Vec<usize> = parts
            .map(|p| p.parse::<usize>().ok())
            .collect::<Option<Vec<_>>>()?;
        if !params.iter().all(|&p| valid_period(p)) {
            return None;
        }

        match (head, params.as_slice()) {
            ("RSI", []) => Some(IndicatorType::Rsi(DEFAULT_RSI_PERIOD)),
            ("RSI", [n]) => Some(IndicatorType::Rsi(*n)),
            ("SMA", [n]) => Some(IndicatorType::Sma(*n)),
            ("EMA", [n]) => Some(IndicatorType::Ema(*n)),
            ("MACD", []) => Some(IndicatorType::Macd {
                fast: macd::DEFAULT_FAST,
                slow: macd::DEFAULT_SLOW,
                signal: macd::DEFAULT_SIGNAL,
            }),
            ("MACD", [fast, slow, signal]) if fast < slow => Some(IndicatorType::Macd {
                fast: *fast,
                slow: *slow,
                signal: *signal,
            }),
            _ => None,
        }
    }

    /// Column names this indicator writes onto annotated bars.
    pub fn columns(&self) -> Vec<String> {
        match self {
            IndicatorType::Macd { fast, slow, signal } => vec![
                format!("MACD_{}_{}_{}", fast, slow, signal),
                format!("MACDs_{}_{}_{}", fast, slow, signal),
                format!("MACDh_{}_{}_{}", fast, slow, signal),
            ],
            other => vec![other.primary_column()],
        }
    }

    /// The first (or only) column of this indicator.
    pub fn primary_column(&self) -> String {
        match self {
            IndicatorType::Sma(n) => format!("SMA_{}", n),
            IndicatorType::Ema(n) => format!("EMA_{}", n),
            IndicatorType::Rsi(n) => format!("RSI_{}", n),
            IndicatorType::Macd { fast, slow, signal } => {
                format!("MACD_{}_{}_{}", fast, slow, signal)
            }
            IndicatorType::Resistance(n) => format!("RES_{}", n),
            IndicatorType::Support(n) => format!("SUP_{}", n),
        }
    }

    /// Bars needed before the first valid value appears.
    pub fn min_bars(&self) -> usize {
        match *self {
            IndicatorType::Sma(n) | IndicatorType::Ema(n) => n,
            IndicatorType::Rsi(n) => n.saturating_add(1),
            IndicatorType::Macd { fast, slow, signal } => {
                fast.max(slow).saturating_add(signal).saturating_sub(1)
            }
            IndicatorType::Resistance(n) | IndicatorType::Support(n) => {
                n.saturating_mul(2).saturating_add(1)
            }
        }
    }

    pub fn calculate(&self, bars: &[Bar]) -> IndicatorSeries {
        match *self {
            IndicatorType::Sma(n) => calculate_sma(bars, n),
            IndicatorType::Ema(n) => calculate_ema(bars, n),
            IndicatorType::Rsi(n) => calculate_rsi(bars, n),
            IndicatorType::Macd { fast, slow, signal } => calculate_macd(bars, fast, slow, signal),
            IndicatorType::Resistance(n) => calculate_resistance(bars, n),
            IndicatorType::Support(n) => calculate_support(bars, n),
        }
    }
}

impl IndicatorSeries {
    /// Write every valid point onto the bar at the same index.
    ///
    /// Invalid (warm-up) points leave the column absent on that bar.
    pub fn write_columns(&self, bars: &mut [Bar]) {
        let columns = self.indicator_type.columns();
        for (bar, point) in bars.iter_mut().zip(&self.values) {
            if !point.valid {
                continue;
            }
            match point.value {
                IndicatorValue::Simple(v) => bar.set_indicator(&columns[0], v),
                IndicatorValue::Macd {
                    line,
                    signal,
                    histogram,
                } => {
                    bar.set_indicator(&columns[0], line);
                    bar.set_indicator(&columns[1], signal);
                    bar.set_indicator(&columns[2], histogram);
                }
            }
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Resistance(lookback) => write!(f, "RESISTANCE({})", lookback),
            IndicatorType::Support(lookback) => write!(f, "SUPPORT({})", lookback),
        }
    }
}

/// Placeholder point for warm-up bars.
pub(crate) fn invalid_point(bar: &Bar) -> IndicatorPoint {
    IndicatorPoint {
        timestamp: bar.timestamp,
        valid: false,
        value: IndicatorValue::Simple(0.0),
    }
}

/// Pair per-bar values with their bars; `None` marks a warm-up bar.
pub(crate) fn simple_series(
    indicator_type: IndicatorType,
    bars: &[Bar],
    values: Vec<Option<f64>>,
) -> IndicatorSeries {
    let values = bars
        .iter()
        .zip(values)
        .map(|(bar, value)| match value {
            Some(v) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Simple(v),
            },
            None => invalid_point(bar),
        })
        .collect();
    IndicatorSeries {
        indicator_type,
        values,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::ohlcv::Bar;
    use chrono::{Duration, NaiveDate};

    pub fn make_bars(prices: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                Bar::new(
                    start + Duration::days(i as i64),
                    close,
                    close,
                    close,
                    close,
                    1000,
                )
            })
            .collect()
    }
}
