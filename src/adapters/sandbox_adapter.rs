//! Interpreter sandbox for dynamically supplied predicates.
//!
//! The predicate language has no I/O, so capability restriction comes from
//! the language itself. Isolation comes from the worker: it receives a
//! serialized snapshot of the bars, owns everything it touches, and hands
//! back a serialized signal vector. Resource limits are a fuel counter and a
//! wall-clock deadline enforced inside the worker, plus a caller-side
//! timeout that abandons a worker which fails to report in time.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::domain::error::SignalEvaluationError;
use crate::domain::ohlcv::Bar;
use crate::domain::predicate::Predicate;
use crate::domain::rule_eval::Budget;
use crate::domain::settings::SandboxSettings;
use crate::domain::signal::SignalSequence;
use crate::domain::strategy::PredicateSource;
use crate::ports::sandbox_port::PredicateSandbox;

#[derive(Debug, Clone, Copy)]
pub struct InterpreterSandbox {
    time_budget: Duration,
    fuel: u64,
    max_source_bytes: usize,
}

impl InterpreterSandbox {
    pub fn new(time_budget: Duration, fuel: u64, max_source_bytes: usize) -> Self {
        InterpreterSandbox {
            time_budget,
            fuel,
            max_source_bytes,
        }
    }

    pub fn from_settings(settings: &SandboxSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.time_budget_ms),
            settings.fuel,
            settings.max_source_bytes,
        )
    }

    fn timed_out(&self) -> SignalEvaluationError {
        SignalEvaluationError::TimedOut {
            budget_ms: self.time_budget.as_millis() as u64,
        }
    }
}

fn codec(e: serde_json::Error) -> SignalEvaluationError {
    SignalEvaluationError::Codec {
        reason: e.to_string(),
    }
}

/// Worker body: everything here operates on owned, decoded copies.
fn evaluate_snapshot(
    source: &str,
    snapshot: &[u8],
    fuel: u64,
    time_budget: Duration,
) -> Result<Vec<u8>, SignalEvaluationError> {
    let mut budget = Budget::new(fuel, Some(time_budget));
    let bars: Vec<Bar> = serde_json::from_slice(snapshot).map_err(codec)?;
    let predicate = Predicate::compile(source).map_err(SignalEvaluationError::Compile)?;
    let signals = predicate.evaluate(bars, &mut budget)?;
    tracing::trace!(fuel_used = budget.consumed(), "predicate evaluated");
    serde_json::to_vec(&signals).map_err(codec)
}

impl PredicateSandbox for InterpreterSandbox {
    fn run(
        &self,
        source: &PredicateSource,
        bars: &[Bar],
    ) -> Result<SignalSequence, SignalEvaluationError> {
        let text = source.as_str();
        if text.len() > self.max_source_bytes {
            return Err(SignalEvaluationError::Rejected {
                reason: format!(
                    "source is {} bytes, limit is {}",
                    text.len(),
                    self.max_source_bytes
                ),
            });
        }

        let snapshot = serde_json::to_vec(bars).map_err(codec)?;
        let text = text.to_string();
        let fuel = self.fuel;
        let time_budget = self.time_budget;
        let (tx, rx) = mpsc::sync_channel(1);

        thread::Builder::new()
            .name("predicate-sandbox".into())
            .spawn(move || {
                let outcome = evaluate_snapshot(&text, &snapshot, fuel, time_budget);
                // The caller may have given up already.
                let _ = tx.send(outcome);
            })
            .map_err(|e| SignalEvaluationError::Faulted {
                reason: format!("could not start sandbox worker: {e}"),
            })?;

        let encoded = match rx.recv_timeout(self.time_budget) {
            Ok(outcome) => outcome?,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(budget_ms = self.time_budget.as_millis() as u64, "predicate worker abandoned");
                return Err(self.timed_out());
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(SignalEvaluationError::Faulted {
                    reason: "sandbox worker terminated without a result".into(),
                });
            }
        };

        let flags: Vec<bool> = serde_json::from_slice(&encoded).map_err(codec)?;
        if flags.len() != bars.len() {
            return Err(SignalEvaluationError::LengthMismatch {
                expected: bars.len(),
                actual: flags.len(),
            });
        }
        Ok(SignalSequence::new(flags))
    }
}
