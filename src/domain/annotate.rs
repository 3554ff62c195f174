//! Indicator annotation.
//!
//! Resolves requested indicator names against the catalog, appends the
//! resulting columns to every bar, and trims the leading warm-up rows.

use std::collections::BTreeSet;

use crate::domain::indicator::IndicatorType;
use crate::domain::ohlcv::Bar;

/// Resolve catalog names, ignoring the ones the catalog does not know.
pub fn resolve_indicators<S: AsRef<str>>(names: &[S]) -> BTreeSet<IndicatorType> {
    let mut out = BTreeSet::new();
    for name in names {
        match IndicatorType::from_name(name.as_ref()) {
            Some(ind) => {
                out.insert(ind);
            }
            None => tracing::debug!(indicator = name.as_ref(), "ignoring unknown indicator"),
        }
    }
    out
}

/// Compute each indicator over the full series and append its columns.
///
/// Rows without enough history keep the column absent; nothing is dropped.
pub fn annotate(mut bars: Vec<Bar>, indicators: &BTreeSet<IndicatorType>) -> Vec<Bar> {
    for indicator in indicators {
        indicator.calculate(&bars).write_columns(&mut bars);
    }
    bars
}

/// Drop leading bars that lack any column of the requested indicators.
///
/// Returns the trimmed series and the number of removed rows.
pub fn trim_warmup(bars: Vec<Bar>, indicators: &BTreeSet<IndicatorType>) -> (Vec<Bar>, usize) {
    let columns: Vec<String> = indicators.iter().flat_map(|i| i.columns()).collect();
    let first_complete = bars
        .iter()
        .position(|b| columns.iter().all(|c| b.has_indicator(c)))
        .unwrap_or(bars.len());
    let trimmed = bars.into_iter().skip(first_complete).collect();
    (trimmed, first_complete)
}
