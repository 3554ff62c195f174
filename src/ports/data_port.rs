//! Historical data provider port.

use chrono::NaiveDateTime;

use crate::domain::error::PatternIqError;
use crate::domain::ohlcv::Bar;

pub trait DataPort {
    /// Bars for `symbol` at `interval` within `[start, end]`, ordered by timestamp.
    ///
    /// An empty vector means the provider had nothing; callers turn that into
    /// `NoData`. Transport failures are `Service` errors.
    fn fetch_bars(
        &self,
        symbol: &str,
        interval: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, PatternIqError>;
}
