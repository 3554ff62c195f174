#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use patterniq::domain::backtest::BacktestRequest;
use patterniq::domain::error::{PatternIqError, SignalEvaluationError};
use patterniq::domain::metrics::PerformanceSummary;
pub use patterniq::domain::ohlcv::Bar;
use patterniq::domain::strategy::{PredicateSource, StrategySpec, parse_strategy_response};
use patterniq::ports::data_port::DataPort;
use patterniq::ports::interpretation_port::InterpretationPort;
use patterniq::ports::narrative_port::NarrativePort;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
    fetches: AtomicUsize,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        _interval: &str,
        _start: NaiveDateTime,
        _end: NaiveDateTime,
    ) -> Result<Vec<Bar>, PatternIqError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.errors.get(symbol) {
            return Err(PatternIqError::service("mock", reason.clone()));
        }
        Ok(self.data.get(symbol).cloned().unwrap_or_default())
    }
}

/// Interpretation double answering with a canned service response.
pub struct FixtureInterpreter {
    pub response: String,
    pub predicate: Option<String>,
}

impl FixtureInterpreter {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, source: &str) -> Self {
        self.predicate = Some(source.to_string());
        self
    }
}

impl InterpretationPort for FixtureInterpreter {
    fn interpret(&self, _strategy_text: &str) -> Result<StrategySpec, PatternIqError> {
        parse_strategy_response(&self.response)
    }

    fn generate_predicate(
        &self,
        _spec: &StrategySpec,
        _columns: &[String],
    ) -> Result<PredicateSource, SignalEvaluationError> {
        self.predicate
            .as_deref()
            .map(PredicateSource::new)
            .ok_or(SignalEvaluationError::MissingPredicate)
    }
}

pub struct FixtureNarrator {
    pub text: Option<String>,
}

impl FixtureNarrator {
    pub fn ok(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self { text: None }
    }
}

impl NarrativePort for FixtureNarrator {
    fn narrate(
        &self,
        _summary: &PerformanceSummary,
        _request: &BacktestRequest,
    ) -> Result<String, PatternIqError> {
        self.text
            .clone()
            .ok_or_else(|| PatternIqError::service("narrator", "unavailable"))
    }
}

pub fn day(n: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(n)
}

/// Clock used by orchestrator tests: shortly after the generated bars.
pub fn test_now() -> NaiveDateTime {
    day(60)
}

pub fn make_bar(index: i64, close: f64) -> Bar {
    Bar::new(day(index), close, close + 1.0, close - 1.0, close, 1000)
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i as i64, c))
        .collect()
}

pub fn flat_bars(count: usize, price: f64) -> Vec<Bar> {
    bars_from_closes(&vec![price; count])
}

pub fn request(symbol: &str, strategy: &str) -> BacktestRequest {
    BacktestRequest {
        symbol: symbol.to_string(),
        interval: "1d".to_string(),
        capital: 100_000.0,
        risk_percent: 2.0,
        sl_percent: 2.0,
        target_percent: 2.0,
        strategy_text: strategy.to_string(),
    }
}

pub const BREAKOUT_SPEC: &str = r#"```json
{"entry_condition": "Close breaks above 101", "pattern_to_find": "resistance_breakout", "required_indicators": []}
```"#;

pub const NONE_SPEC_SMA3: &str =
    r#"{"entry_condition": "price above SMA 3", "pattern_to_find": "none", "required_indicators": []}"#;
