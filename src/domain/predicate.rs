//! Compiled entry predicates.
//!
//! A predicate is DSL source text from an untrusted generator. Compiling it
//! yields a `Rule`; evaluating it first computes any indicator the rule reads
//! that the bars do not already carry, then walks every bar under a `Budget`.

use std::collections::BTreeSet;

use crate::domain::error::{ParseError, SignalEvaluationError};
use crate::domain::indicator::IndicatorType;
use crate::domain::ohlcv::Bar;
use crate::domain::rule::Rule;
use crate::domain::rule_eval::{self, Budget};
use crate::domain::rule_parser;

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    rule: Rule,
}

impl Predicate {
    pub fn compile(source: &str) -> Result<Self, ParseError> {
        Ok(Predicate {
            rule: rule_parser::parse(source.trim())?,
        })
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn indicators(&self) -> BTreeSet<IndicatorType> {
        self.rule.extract_indicators()
    }

    /// Indicators the rule reads that no bar carries yet.
    pub fn missing_indicators(&self, bars: &[Bar]) -> Vec<IndicatorType> {
        self.indicators()
            .into_iter()
            .filter(|ind| {
                let column = ind.primary_column();
                !bars.iter().any(|b| b.has_indicator(&column))
            })
            .collect()
    }

    /// Evaluate over owned bars, computing missing indicator columns first.
    pub fn evaluate(
        &self,
        mut bars: Vec<Bar>,
        budget: &mut Budget,
    ) -> Result<Vec<bool>, SignalEvaluationError> {
        for indicator in self.missing_indicators(&bars) {
            budget.check_deadline()?;
            indicator.calculate(&bars).write_columns(&mut bars);
        }
        let signals = rule_eval::evaluate_series(&self.rule, &bars, budget)?;
        if signals.len() != bars.len() {
            return Err(SignalEvaluationError::LengthMismatch {
                expected: bars.len(),
                actual: signals.len(),
            });
        }
        Ok(signals)
    }
}
