//! Rule evaluation engine.
//!
//! Evaluates rules against annotated bars. Indicator operands read the bar
//! column named by `IndicatorRef::column`; an absent column resolves to NaN,
//! so every comparison touching it is false.
//!
//! # Evaluation Semantics
//!
//! - Comparison rules: Evaluate at the given bar index
//! - `CROSS_ABOVE`/`CROSS_BELOW`: Require `index >= 1`, return `false` at index 0
//! - `AND`: Short-circuits on first `false`
//! - `OR`: Short-circuits on first `true`
//! - `CONSECUTIVE(rule, N)`: Child must be true for N consecutive bars ending at current
//! - `ANY_OF(rule, N)`: Child must be true at least once in the last N bars
//!
//! Every node visit costs one unit of fuel from the `Budget`.

use crate::domain::error::SignalEvaluationError;
use crate::domain::ohlcv::Bar;
use crate::domain::rule::{Operand, Rule};
use std::time::{Duration, Instant};

const EPSILON: f64 = 1e-9;

/// The wall clock is consulted once per this many steps.
const DEADLINE_CHECK_INTERVAL: u64 = 1024;

/// Fuel and wall-clock allowance for one evaluation run.
#[derive(Debug, Clone)]
pub struct Budget {
    fuel: u64,
    remaining: u64,
    deadline: Option<(Instant, Duration)>,
    steps: u64,
}

impl Budget {
    pub fn new(fuel: u64, time_budget: Option<Duration>) -> Self {
        Budget {
            fuel,
            remaining: fuel,
            deadline: time_budget.map(|d| (Instant::now() + d, d)),
            steps: 0,
        }
    }

    /// No fuel or time limit. Used for trusted built-in rules.
    pub fn unlimited() -> Self {
        Budget::new(u64::MAX, None)
    }

    pub fn consumed(&self) -> u64 {
        self.fuel - self.remaining
    }

    fn charge(&mut self) -> Result<(), SignalEvaluationError> {
        if self.remaining == 0 {
            return Err(SignalEvaluationError::FuelExhausted { fuel: self.fuel });
        }
        self.remaining -= 1;
        self.steps += 1;
        if self.steps % DEADLINE_CHECK_INTERVAL == 0 {
            self.check_deadline()?;
        }
        Ok(())
    }

    pub fn check_deadline(&self) -> Result<(), SignalEvaluationError> {
        match self.deadline {
            Some((at, budget)) if Instant::now() >= at => Err(SignalEvaluationError::TimedOut {
                budget_ms: budget.as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }
}

pub fn evaluate(
    rule: &Rule,
    bars: &[Bar],
    bar_index: usize,
    budget: &mut Budget,
) -> Result<bool, SignalEvaluationError> {
    budget.charge()?;
    let result = match rule {
        Rule::CrossAbove { left, right } => {
            if bar_index == 0 {
                return Ok(false);
            }
            let left_curr = resolve_operand(left, &bars[bar_index]);
            let right_curr = resolve_operand(right, &bars[bar_index]);
            let left_prev = resolve_operand(left, &bars[bar_index - 1]);
            let right_prev = resolve_operand(right, &bars[bar_index - 1]);

            left_curr > right_curr && left_prev <= right_prev
        }
        Rule::CrossBelow { left, right } => {
            if bar_index == 0 {
                return Ok(false);
            }
            let left_curr = resolve_operand(left, &bars[bar_index]);
            let right_curr = resolve_operand(right, &bars[bar_index]);
            let left_prev = resolve_operand(left, &bars[bar_index - 1]);
            let right_prev = resolve_operand(right, &bars[bar_index - 1]);

            left_curr < right_curr && left_prev >= right_prev
        }
        Rule::Above { left, right } => {
            resolve_operand(left, &bars[bar_index]) > resolve_operand(right, &bars[bar_index])
        }
        Rule::Below { left, right } => {
            resolve_operand(left, &bars[bar_index]) < resolve_operand(right, &bars[bar_index])
        }
        Rule::Between {
            operand,
            lower,
            upper,
        } => {
            let val = resolve_operand(operand, &bars[bar_index]);
            val >= *lower && val <= *upper
        }
        Rule::Equals { left, right } => {
            let left_val = resolve_operand(left, &bars[bar_index]);
            let right_val = resolve_operand(right, &bars[bar_index]);
            (left_val - right_val).abs() < EPSILON
        }
        Rule::And(rules) => {
            for r in rules {
                if !evaluate(r, bars, bar_index, budget)? {
                    return Ok(false);
                }
            }
            true
        }
        Rule::Or(rules) => {
            for r in rules {
                if evaluate(r, bars, bar_index, budget)? {
                    return Ok(true);
                }
            }
            false
        }
        Rule::Not(rule) => !evaluate(rule, bars, bar_index, budget)?,
        Rule::Consecutive { rule, count } => {
            if *count == 0 || bar_index + 1 < *count {
                return Ok(false);
            }
            for i in (bar_index + 1 - *count)..=bar_index {
                if !evaluate(rule, bars, i, budget)? {
                    return Ok(false);
                }
            }
            true
        }
        Rule::AnyOf { rule, count } => {
            if *count == 0 {
                return Ok(false);
            }
            let start = bar_index.saturating_sub(*count - 1);
            for i in start..=bar_index {
                if evaluate(rule, bars, i, budget)? {
                    return Ok(true);
                }
            }
            false
        }
    };
    Ok(result)
}

/// Evaluate the rule at every bar, producing a signal aligned with `bars`.
pub fn evaluate_series(
    rule: &Rule,
    bars: &[Bar],
    budget: &mut Budget,
) -> Result<Vec<bool>, SignalEvaluationError> {
    let mut signals = Vec::with_capacity(bars.len());
    for i in 0..bars.len() {
        signals.push(evaluate(rule, bars, i, budget)?);
    }
    Ok(signals)
}

fn resolve_operand(operand: &Operand, bar: &Bar) -> f64 {
    match operand {
        Operand::Open => bar.open,
        Operand::High => bar.high,
        Operand::Low => bar.low,
        Operand::Close => bar.close,
        Operand::Volume => bar.volume as f64,
        Operand::Constant(v) => *v,
        Operand::Indicator(ind_ref) => bar.indicator(&ind_ref.column()).unwrap_or(f64::NAN),
        Operand::Column(name) => match name.to_ascii_lowercase().as_str() {
            "open" => bar.open,
            "high" => bar.high,
            "low" => bar.low,
            "close" => bar.close,
            "volume" => bar.volume as f64,
            _ => bar.indicator(name).unwrap_or(f64::NAN),
        },
    }
}
