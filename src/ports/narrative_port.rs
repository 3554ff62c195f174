//! Narrative service port.

use crate::domain::backtest::BacktestRequest;
use crate::domain::error::PatternIqError;
use crate::domain::metrics::PerformanceSummary;

pub trait NarrativePort {
    /// Free-text commentary on a finished backtest. Opaque to the core.
    fn narrate(
        &self,
        summary: &PerformanceSummary,
        request: &BacktestRequest,
    ) -> Result<String, PatternIqError>;
}
