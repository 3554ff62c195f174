//! Signal evaluation.
//!
//! Turns a `StrategySpec` into a per-bar entry signal. Pattern-free specs are
//! matched against the built-in templates and evaluated in-process; pattern
//! specs run their dynamically supplied predicate through the
//! `PredicateSandbox` port. Every failure on the dynamic path degrades to an
//! all-false signal so the backtest continues with zero trades.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::domain::error::SignalEvaluationError;
use crate::domain::indicator::IndicatorType;
use crate::domain::ohlcv::Bar;
use crate::domain::rule_eval::{self, Budget};
use crate::domain::strategy::{PredicateSource, StrategySpec};
use crate::domain::templates::{self, Template};
use crate::ports::sandbox_port::PredicateSandbox;

/// Boolean entry flags aligned one-to-one with a bar sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignalSequence(Vec<bool>);

impl SignalSequence {
    pub fn new(flags: Vec<bool>) -> Self {
        SignalSequence(flags)
    }

    pub fn all_false(len: usize) -> Self {
        SignalSequence(vec![false; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&s| s).count()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }
}

/// Where the signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Template,
    Predicate,
    Fallback,
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignalSource::Template => "template",
            SignalSource::Predicate => "predicate",
            SignalSource::Fallback => "fallback",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalOutcome {
    pub signals: SignalSequence,
    pub source: SignalSource,
}

impl SignalOutcome {
    fn fallback(len: usize) -> Self {
        SignalOutcome {
            signals: SignalSequence::all_false(len),
            source: SignalSource::Fallback,
        }
    }
}

/// Indicators a pattern-free spec needs for its template, if one matches.
pub fn template_indicators(spec: &StrategySpec) -> BTreeSet<IndicatorType> {
    if !spec.pattern.is_none() {
        return BTreeSet::new();
    }
    templates::match_template(&spec.entry_condition)
        .map(|t| t.rule.extract_indicators())
        .unwrap_or_default()
}

pub struct SignalEvaluator<'a> {
    sandbox: &'a dyn PredicateSandbox,
}

impl<'a> SignalEvaluator<'a> {
    pub fn new(sandbox: &'a dyn PredicateSandbox) -> Self {
        SignalEvaluator { sandbox }
    }

    pub fn evaluate(
        &self,
        bars: &[Bar],
        spec: &StrategySpec,
        predicate: Option<&PredicateSource>,
    ) -> SignalOutcome {
        if spec.pattern.is_none() {
            return match templates::match_template(&spec.entry_condition) {
                Some(template) => evaluate_template(&template, bars),
                None => {
                    tracing::warn!(
                        entry_condition = %spec.entry_condition,
                        "entry condition matches no built-in template, using empty signal"
                    );
                    SignalOutcome::fallback(bars.len())
                }
            };
        }

        match self.run_predicate(bars, predicate) {
            Ok(signals) => SignalOutcome {
                signals,
                source: SignalSource::Predicate,
            },
            Err(e) => {
                tracing::warn!(
                    pattern = %spec.pattern,
                    error = %e,
                    "predicate evaluation failed, using empty signal"
                );
                SignalOutcome::fallback(bars.len())
            }
        }
    }

    fn run_predicate(
        &self,
        bars: &[Bar],
        predicate: Option<&PredicateSource>,
    ) -> Result<SignalSequence, SignalEvaluationError> {
        let source = predicate.ok_or(SignalEvaluationError::MissingPredicate)?;
        let signals = self.sandbox.run(source, bars)?;
        if signals.len() != bars.len() {
            return Err(SignalEvaluationError::LengthMismatch {
                expected: bars.len(),
                actual: signals.len(),
            });
        }
        Ok(signals)
    }
}

fn evaluate_template(template: &Template, bars: &[Bar]) -> SignalOutcome {
    tracing::debug!(template = template.name, rule = %template.rule, "evaluating built-in template");
    match rule_eval::evaluate_series(&template.rule, bars, &mut Budget::unlimited()) {
        Ok(flags) => SignalOutcome {
            signals: SignalSequence::new(flags),
            source: SignalSource::Template,
        },
        Err(e) => {
            tracing::warn!(template = template.name, error = %e, "template evaluation failed");
            SignalOutcome::fallback(bars.len())
        }
    }
}
