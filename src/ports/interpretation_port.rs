//! Strategy interpretation service port.

use crate::domain::error::{PatternIqError, SignalEvaluationError};
use crate::domain::strategy::{PredicateSource, StrategySpec};

pub trait InterpretationPort {
    /// Translate free-text strategy into a structured spec.
    ///
    /// A response that does not parse as the structured schema is
    /// `StrategyParse`; a transport failure is `Service`.
    fn interpret(&self, strategy_text: &str) -> Result<StrategySpec, PatternIqError>;

    /// Produce predicate source for a pattern-based spec. `columns` lists the
    /// annotated columns available to the predicate.
    fn generate_predicate(
        &self,
        spec: &StrategySpec,
        columns: &[String],
    ) -> Result<PredicateSource, SignalEvaluationError>;
}
