//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1). The first value is the mean of the first n inputs, then
//! EMA[i] = x[i]*k + EMA[i-1]*(1-k). The first n-1 bars are warm-up.

use crate::domain::indicator::{IndicatorSeries, IndicatorType, simple_series};
use crate::domain::ohlcv::Bar;

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    simple_series(IndicatorType::Ema(period), bars, seeded_ema(&closes, period))
}

/// EMA over any input series, aligned with it.
pub(crate) fn seeded_ema(input: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; input.len()];
    if period == 0 || input.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = input[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(ema);
    for (slot, &x) in out.iter_mut().zip(input).skip(period) {
        ema = x * k + ema * (1.0 - k);
        *slot = Some(ema);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorValue;
    use crate::domain::indicator::test_support::make_bars;
    use approx::assert_relative_eq;

    fn value_at(series: &IndicatorSeries, i: usize) -> f64 {
        match series.values[i].value {
            IndicatorValue::Simple(v) => v,
            _ => panic!("Expected Simple value"),
        }
    }

    #[test]
    fn warmup_then_seed() {
        let series = calculate_ema(&make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]), 3);

        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert_relative_eq!(value_at(&series, 2), 20.0);
    }

    #[test]
    fn recursion_after_seed() {
        let series = calculate_ema(&make_bars(&[10.0, 20.0, 30.0, 40.0, 50.0]), 3);

        // k = 0.5
        let third = 40.0 * 0.5 + 20.0 * 0.5;
        let fourth = 50.0 * 0.5 + third * 0.5;
        assert_relative_eq!(value_at(&series, 3), third);
        assert_relative_eq!(value_at(&series, 4), fourth);
    }

    #[test]
    fn constant_input_is_constant() {
        let series = calculate_ema(&make_bars(&[100.0; 6]), 3);
        for i in 2..6 {
            assert_relative_eq!(value_at(&series, i), 100.0);
        }
    }

    #[test]
    fn seeded_ema_on_short_input() {
        assert_eq!(seeded_ema(&[1.0, 2.0], 3), vec![None, None]);
        assert_eq!(seeded_ema(&[1.0, 3.0], 2), vec![None, Some(2.0)]);
        assert!(seeded_ema(&[], 3).is_empty());
    }

    #[test]
    fn zero_period_keeps_alignment() {
        let series = calculate_ema(&make_bars(&[10.0, 20.0]), 0);
        assert_eq!(series.values.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
        assert_eq!(series.indicator_type, IndicatorType::Ema(0));
    }
}
