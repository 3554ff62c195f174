//! Deterministic narrator for offline runs.

use crate::domain::backtest::BacktestRequest;
use crate::domain::error::PatternIqError;
use crate::domain::metrics::PerformanceSummary;
use crate::domain::narrative::render_local_narrative;
use crate::ports::narrative_port::NarrativePort;

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalNarrator;

impl NarrativePort for LocalNarrator {
    fn narrate(
        &self,
        summary: &PerformanceSummary,
        request: &BacktestRequest,
    ) -> Result<String, PatternIqError> {
        Ok(render_local_narrative(summary, request))
    }
}
