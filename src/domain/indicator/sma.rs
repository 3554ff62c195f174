//! Simple Moving Average indicator.
//!
//! SMA[i] = mean(close[i-n+1..=i]), kept as a running window sum.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, simple_series};
use crate::domain::ohlcv::Bar;

pub fn calculate_sma(bars: &[Bar], period: usize) -> IndicatorSeries {
    let values = if period == 0 {
        vec![None; bars.len()]
    } else {
        let mut window_sum = 0.0;
        bars.iter()
            .enumerate()
            .map(|(i, bar)| {
                window_sum += bar.close;
                if i >= period {
                    window_sum -= bars[i - period].close;
                }
                (i + 1 >= period).then(|| window_sum / period as f64)
            })
            .collect()
    };
    simple_series(IndicatorType::Sma(period), bars, values)
}
