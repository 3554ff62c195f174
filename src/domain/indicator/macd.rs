//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! Line = EMA(fast) - EMA(slow), signal = EMA(signal) of the line,
//! histogram = line - signal. A bar is valid once the signal exists,
//! i.e. after max(fast, slow) - 1 + signal - 1 warm-up bars.

use crate::domain::indicator::ema::seeded_ema;
use crate::domain::indicator::{
    IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, invalid_point,
};
use crate::domain::ohlcv::Bar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(bars: &[Bar], fast: usize, slow: usize, signal_period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let line = macd_line(&closes, fast, slow);

    // The signal EMA starts on the first bar that has a line value.
    let first_line = line.iter().position(Option::is_some).unwrap_or(line.len());
    let defined: Vec<f64> = line[first_line..].iter().flatten().copied().collect();
    let mut signal = vec![None; first_line];
    signal.extend(seeded_ema(&defined, signal_period));

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match (line[i], signal[i]) {
            (Some(macd), Some(sig)) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: IndicatorValue::Macd {
                    line: macd,
                    signal: sig,
                    histogram: macd - sig,
                },
            },
            _ => invalid_point(bar),
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

fn macd_line(closes: &[f64], fast: usize, slow: usize) -> Vec<Option<f64>> {
    seeded_ema(closes, fast)
        .into_iter()
        .zip(seeded_ema(closes, slow))
        .map(|(f, s)| Some(f? - s?))
        .collect()
}
