//! RSI (Relative Strength Index) with Wilder smoothing.
//!
//! The first average gain/loss is the plain mean of the first n changes;
//! later ones are (prev * (n-1) + current) / n. RSI = 100 - 100/(1 + gain/loss),
//! and 100 when the average loss is zero. Bar n is the first valid bar.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, simple_series};
use crate::domain::ohlcv::Bar;

pub fn calculate_rsi(bars: &[Bar], period: usize) -> IndicatorSeries {
    simple_series(IndicatorType::Rsi(period), bars, rsi_values(bars, period))
}

fn rsi_values(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() <= period {
        return out;
    }

    let changes: Vec<(f64, f64)> = bars
        .windows(2)
        .map(|w| {
            let change = w[1].close - w[0].close;
            (change.max(0.0), (-change).max(0.0))
        })
        .collect();

    let n = period as f64;
    let (gain_sum, loss_sum) = changes[..period]
        .iter()
        .fold((0.0, 0.0), |(g, l), &(gain, loss)| (g + gain, l + loss));
    let mut avg_gain = gain_sum / n;
    let mut avg_loss = loss_sum / n;
    out[period] = Some(strength_index(avg_gain, avg_loss));

    for (offset, &(gain, loss)) in changes[period..].iter().enumerate() {
        avg_gain = (avg_gain * (n - 1.0) + gain) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss) / n;
        out[period + 1 + offset] = Some(strength_index(avg_gain, avg_loss));
    }
    out
}

fn strength_index(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
