//! Predicate sandbox port.

use crate::domain::error::SignalEvaluationError;
use crate::domain::ohlcv::Bar;
use crate::domain::signal::SignalSequence;
use crate::domain::strategy::PredicateSource;

/// Runs untrusted predicate source against a snapshot of the bars.
///
/// Implementations receive the bars by value semantics only: nothing the
/// predicate does may reach the caller's state. The returned sequence must
/// be aligned with `bars`.
pub trait PredicateSandbox {
    fn run(
        &self,
        source: &PredicateSource,
        bars: &[Bar],
    ) -> Result<SignalSequence, SignalEvaluationError>;
}
