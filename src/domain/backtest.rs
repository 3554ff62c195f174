//! Backtest orchestration.
//!
//! `BacktestOrchestrator::run` sequences one request end to end:
//! interpret -> fetch -> annotate -> signal -> simulate -> summarise ->
//! narrate -> report. Collaborators arrive as port references at
//! construction time; nothing is shared between runs.

use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::annotate::{annotate, resolve_indicators, trim_warmup};
use crate::domain::error::PatternIqError;
use crate::domain::metrics::PerformanceSummary;
use crate::domain::narrative::render_local_narrative;
use crate::domain::ohlcv::{Bar, normalize_series};
use crate::domain::report::{Report, ReportInput};
use crate::domain::settings::Lookback;
use crate::domain::signal::{SignalEvaluator, template_indicators};
use crate::domain::simulator::{SimulationParams, simulate};
use crate::ports::data_port::DataPort;
use crate::ports::interpretation_port::InterpretationPort;
use crate::ports::narrative_port::NarrativePort;
use crate::ports::sandbox_port::PredicateSandbox;

pub const SUPPORTED_INTERVALS: &[&str] = &[
    "1m", "2m", "5m", "15m", "30m", "60m", "90m", "1h", "1d", "5d", "1wk", "1mo", "3mo",
];

/// Raw OHLCV columns every predicate may read.
const BASE_COLUMNS: &[&str] = &["timestamp", "open", "high", "low", "close", "volume"];

/// Minute and hour bars.
pub fn is_intraday(interval: &str) -> bool {
    (interval.ends_with('m') && !interval.ends_with("mo")) || interval.ends_with('h')
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub symbol: String,
    pub interval: String,
    pub capital: f64,
    pub risk_percent: f64,
    pub sl_percent: f64,
    pub target_percent: f64,
    pub strategy_text: String,
}

impl BacktestRequest {
    pub fn validate(&self) -> Result<(), PatternIqError> {
        if self.symbol.trim().is_empty() {
            return Err(PatternIqError::invalid_request("symbol", "must not be empty"));
        }
        if !SUPPORTED_INTERVALS.contains(&self.interval.as_str()) {
            return Err(PatternIqError::invalid_request(
                "interval",
                format!(
                    "'{}' is not one of {}",
                    self.interval,
                    SUPPORTED_INTERVALS.join(", ")
                ),
            ));
        }
        if !self.capital.is_finite() || self.capital <= 0.0 {
            return Err(PatternIqError::invalid_request("capital", "must be positive"));
        }
        if !(self.risk_percent > 0.0 && self.risk_percent <= 100.0) {
            return Err(PatternIqError::invalid_request(
                "risk_percent",
                "must be in (0, 100]",
            ));
        }
        if !(self.sl_percent >= 0.0 && self.sl_percent < 100.0) {
            return Err(PatternIqError::invalid_request(
                "sl_percent",
                "must be in [0, 100)",
            ));
        }
        if !self.target_percent.is_finite() || self.target_percent <= 0.0 {
            return Err(PatternIqError::invalid_request(
                "target_percent",
                "must be positive",
            ));
        }
        if self.strategy_text.trim().is_empty() {
            return Err(PatternIqError::invalid_request(
                "strategy_text",
                "must not be empty",
            ));
        }
        Ok(())
    }

    fn simulation_params(&self) -> SimulationParams {
        SimulationParams {
            starting_capital: self.capital,
            risk_percent: self.risk_percent,
            sl_percent: self.sl_percent,
            target_percent: self.target_percent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Cap on the extra history fetched for indicator warm-up.
const MAX_WARMUP_DAYS: i64 = 36_500;

/// Calendar days spanning `bars` sessions of a non-intraday interval, with
/// room for weekends and exchange holidays. Intraday windows get nothing
/// extra.
pub fn warmup_calendar_days(interval: &str, bars: usize) -> i64 {
    if bars == 0 || is_intraday(interval) {
        return 0;
    }
    let bars = bars as u64;
    let days = match interval {
        "1d" => bars.saturating_mul(7).div_ceil(5).saturating_add(7),
        "5d" | "1wk" => bars.saturating_add(1).saturating_mul(7),
        "1mo" => bars.saturating_add(1).saturating_mul(31),
        _ => bars.saturating_add(1).saturating_mul(92),
    };
    i64::try_from(days).map_or(MAX_WARMUP_DAYS, |d| d.min(MAX_WARMUP_DAYS))
}

impl DateRange {
    /// Window ending at `now`, sized by the interval class.
    ///
    /// `warmup_bars` extends the start so that indicators needing that much
    /// history still leave the configured lookback to evaluate.
    pub fn resolve(
        interval: &str,
        now: NaiveDateTime,
        lookback: &Lookback,
        warmup_bars: usize,
    ) -> Self {
        let days = if is_intraday(interval) {
            lookback.intraday_days
        } else {
            lookback.daily_days
        };
        DateRange {
            start: now - Duration::days(days + warmup_calendar_days(interval, warmup_bars)),
            end: now,
        }
    }
}

/// Columns a generated predicate may reference, raw ones first.
pub fn available_columns(bars: &[Bar]) -> Vec<String> {
    let mut columns: Vec<String> = BASE_COLUMNS.iter().map(|c| c.to_string()).collect();
    if let Some(first) = bars.first() {
        columns.extend(first.indicators.keys().cloned());
    }
    columns
}

pub struct BacktestOrchestrator<'a> {
    data: &'a dyn DataPort,
    interpreter: &'a dyn InterpretationPort,
    narrator: &'a dyn NarrativePort,
    sandbox: &'a dyn PredicateSandbox,
    lookback: Lookback,
}

impl<'a> BacktestOrchestrator<'a> {
    pub fn new(
        data: &'a dyn DataPort,
        interpreter: &'a dyn InterpretationPort,
        narrator: &'a dyn NarrativePort,
        sandbox: &'a dyn PredicateSandbox,
        lookback: Lookback,
    ) -> Self {
        BacktestOrchestrator {
            data,
            interpreter,
            narrator,
            sandbox,
            lookback,
        }
    }

    pub fn run(&self, request: &BacktestRequest) -> Result<Report, PatternIqError> {
        self.run_at(request, Local::now().naive_local())
    }

    /// Run with an explicit clock; the fetch window ends at `now`.
    pub fn run_at(
        &self,
        request: &BacktestRequest,
        now: NaiveDateTime,
    ) -> Result<Report, PatternIqError> {
        let span = tracing::info_span!(
            "backtest.run",
            symbol = %request.symbol,
            interval = %request.interval
        );
        let _enter = span.enter();

        request.validate()?;

        // Interpretation failures abort before any data is fetched.
        let spec = self.interpreter.interpret(&request.strategy_text)?;
        tracing::debug!(
            entry_condition = %spec.entry_condition,
            pattern = %spec.pattern,
            indicators = ?spec.required_indicators,
            "strategy interpreted"
        );

        let mut indicators = resolve_indicators(&spec.required_indicators);
        indicators.extend(template_indicators(&spec));
        let minimum = indicators.iter().map(|i| i.min_bars()).max().unwrap_or(1);

        let symbol = request.symbol.trim();
        let range = DateRange::resolve(
            &request.interval,
            now,
            &self.lookback,
            minimum.saturating_sub(1),
        );
        let raw = normalize_series(self.data.fetch_bars(
            symbol,
            &request.interval,
            range.start,
            range.end,
        )?);
        if raw.is_empty() {
            return Err(PatternIqError::NoData {
                symbol: symbol.to_string(),
                interval: request.interval.clone(),
            });
        }
        let fetched = raw.len();
        tracing::debug!(bars = fetched, start = %range.start, end = %range.end, "bars fetched");

        let (bars, removed) = trim_warmup(annotate(raw, &indicators), &indicators);
        if bars.is_empty() {
            return Err(PatternIqError::InsufficientData {
                symbol: symbol.to_string(),
                bars: fetched,
                minimum,
            });
        }
        tracing::debug!(
            indicators = indicators.len(),
            warmup_removed = removed,
            remaining = bars.len(),
            "series annotated"
        );

        let predicate = if spec.pattern.is_none() {
            None
        } else {
            match self
                .interpreter
                .generate_predicate(&spec, &available_columns(&bars))
            {
                Ok(source) => Some(source),
                Err(e) => {
                    tracing::warn!(error = %e, "no predicate obtained for pattern strategy");
                    None
                }
            }
        };

        let outcome = SignalEvaluator::new(self.sandbox).evaluate(&bars, &spec, predicate.as_ref());
        tracing::debug!(
            source = %outcome.source,
            entries = outcome.signals.count(),
            "signals evaluated"
        );

        let simulation = simulate(&bars, &outcome.signals, &request.simulation_params())?;
        let summary = PerformanceSummary::compute(&simulation);

        let narrative = match self.narrator.narrate(&summary, request) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "narrative service failed, using local narrative");
                render_local_narrative(&summary, request)
            }
        };

        tracing::info!(
            trades = summary.num_trades,
            pnl = summary.pnl,
            max_drawdown = summary.max_drawdown,
            signal_source = %outcome.source,
            "backtest complete"
        );

        Ok(Report::build(ReportInput {
            symbol,
            interval: &request.interval,
            simulation: &simulation,
            summary: &summary,
            signal_source: outcome.source,
            bars_evaluated: bars.len(),
            narrative,
        }))
    }
}
