//! Pivot-based support and resistance levels.
//!
//! A pivot high at bar p has high[p] >= high of the `lookback` bars on either
//! side; a pivot low mirrors it on lows. The right-hand confirmation makes a
//! pivot known only at bar p + lookback, so the level at bar i is the most
//! recent pivot confirmed at or before i. Bars before the first confirmation
//! are invalid.

use crate::domain::indicator::{
    IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, invalid_point,
};
use crate::domain::ohlcv::Bar;

pub const DEFAULT_LOOKBACK: usize = 5;

pub fn calculate_resistance(bars: &[Bar], lookback: usize) -> IndicatorSeries {
    pivot_levels(
        bars,
        lookback,
        IndicatorType::Resistance(lookback),
        |b| b.high,
        |candidate, neighbour| candidate >= neighbour,
    )
}

pub fn calculate_support(bars: &[Bar], lookback: usize) -> IndicatorSeries {
    pivot_levels(
        bars,
        lookback,
        IndicatorType::Support(lookback),
        |b| b.low,
        |candidate, neighbour| candidate <= neighbour,
    )
}

fn pivot_levels(
    bars: &[Bar],
    lookback: usize,
    indicator_type: IndicatorType,
    price: impl Fn(&Bar) -> f64,
    dominates: impl Fn(f64, f64) -> bool,
) -> IndicatorSeries {
    let mut values: Vec<IndicatorPoint> = bars.iter().map(invalid_point).collect();
    if lookback == 0 || bars.len() < 2 * lookback + 1 {
        return IndicatorSeries {
            indicator_type,
            values,
        };
    }

    let mut level: Option<f64> = None;
    for i in 0..bars.len() {
        // Bar i confirms the candidate pivot `lookback` bars back.
        if i >= 2 * lookback {
            let p = i - lookback;
            let candidate = price(&bars[p]);
            let is_pivot = (1..=lookback).all(|j| {
                dominates(candidate, price(&bars[p - j]))
                    && dominates(candidate, price(&bars[p + j]))
            });
            if is_pivot {
                level = Some(candidate);
            }
        }

        if let Some(v) = level {
            values[i] = IndicatorPoint {
                timestamp: bars[i].timestamp,
                valid: true,
                value: IndicatorValue::Simple(v),
            };
        }
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}
