//! Backtest report assembly.
//!
//! Monetary and percentage figures are rounded to two decimals; timestamps
//! render as `YYYY-MM-DD HH:MM`.

use serde::Serialize;

use crate::domain::metrics::PerformanceSummary;
use crate::domain::ohlcv::format_timestamp;
use crate::domain::signal::SignalSource;
use crate::domain::simulator::{ExitReason, SimulationResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPointRecord {
    pub date: String,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawdownPointRecord {
    pub date: String,
    pub drawdown: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub entry_date: String,
    pub entry_price: f64,
    pub exit_date: String,
    pub exit_price: f64,
    pub reason: ExitReason,
    pub pnl_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub symbol: String,
    pub interval: String,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub win_rate: f64,
    pub num_trades: usize,
    pub max_drawdown: f64,
    pub profit_factor: f64,
    pub final_equity: f64,
    pub equity_curve: Vec<EquityPointRecord>,
    pub drawdown_curve: Vec<DrawdownPointRecord>,
    pub trades: Vec<TradeRecord>,
    pub signal_source: SignalSource,
    pub bars_evaluated: usize,
    pub narrative: String,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct ReportInput<'a> {
    pub symbol: &'a str,
    pub interval: &'a str,
    pub simulation: &'a SimulationResult,
    pub summary: &'a PerformanceSummary,
    pub signal_source: SignalSource,
    pub bars_evaluated: usize,
    pub narrative: String,
}

impl Report {
    pub fn build(input: ReportInput<'_>) -> Self {
        let ReportInput {
            symbol,
            interval,
            simulation,
            summary,
            signal_source,
            bars_evaluated,
            narrative,
        } = input;

        let equity_curve = simulation
            .equity_curve
            .iter()
            .map(|p| EquityPointRecord {
                date: format_timestamp(p.timestamp),
                equity: round2(p.value),
            })
            .collect();
        let drawdown_curve = simulation
            .drawdown_curve
            .iter()
            .map(|p| DrawdownPointRecord {
                date: format_timestamp(p.timestamp),
                drawdown: round2(p.value),
            })
            .collect();
        let trades = simulation
            .trades
            .iter()
            .map(|t| TradeRecord {
                entry_date: format_timestamp(t.entry_timestamp),
                entry_price: round2(t.entry_price),
                exit_date: format_timestamp(t.exit_timestamp),
                exit_price: round2(t.exit_price),
                reason: t.exit_reason,
                pnl_percent: round2(t.pnl_percent),
            })
            .collect();

        Report {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            pnl: round2(summary.pnl),
            pnl_percent: round2(summary.pnl_percent),
            win_rate: round2(summary.win_rate),
            num_trades: summary.num_trades,
            max_drawdown: round2(summary.max_drawdown),
            profit_factor: round2(summary.profit_factor),
            final_equity: round2(summary.final_equity),
            equity_curve,
            drawdown_curve,
            trades,
            signal_source,
            bars_evaluated,
            narrative,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;
    use crate::domain::signal::SignalSequence;
    use crate::domain::simulator::{SimulationParams, simulate};

    fn sample_report() -> Report {
        let bars = make_bars(&[100.0, 100.0, 103.3333, 103.0]);
        let sim = simulate(
            &bars,
            &SignalSequence::new(vec![false, true, false, false]),
            &SimulationParams {
                starting_capital: 10_000.0,
                risk_percent: 1.0,
                sl_percent: 1.0,
                target_percent: 2.0,
            },
        )
        .unwrap();
        let summary = PerformanceSummary::compute(&sim);
        Report::build(ReportInput {
            symbol: "TCS",
            interval: "1d",
            simulation: &sim,
            summary: &summary,
            signal_source: SignalSource::Template,
            bars_evaluated: bars.len(),
            narrative: "ok".into(),
        })
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(round2(-1.234), -1.23);
        assert_eq!(round2(999.0), 999.0);
    }

    #[test]
    fn report_fields_are_rounded() {
        let report = sample_report();
        assert_eq!(report.num_trades, 1);
        assert_eq!(report.trades[0].pnl_percent, 3.33);
        assert_eq!(report.pnl, 333.33);
        assert_eq!(report.final_equity, 10_333.33);
        assert_eq!(report.profit_factor, 999.0);
    }

    #[test]
    fn curves_use_minute_timestamps() {
        let report = sample_report();
        assert_eq!(report.equity_curve.len(), 2);
        assert_eq!(report.equity_curve[0].date, "2024-01-01 00:00");
        assert_eq!(report.drawdown_curve[1].date, "2024-01-03 00:00");
    }

    #[test]
    fn serializes_to_expected_shape() {
        let json = serde_json::to_value(sample_report()).unwrap();
        assert_eq!(json["signal_source"], "template");
        assert_eq!(json["trades"][0]["reason"], "Target");
        assert!(json["equity_curve"][0]["equity"].is_number());
        assert!(json["drawdown_curve"][0]["drawdown"].is_number());
        assert_eq!(json["narrative"], "ok");
    }
}
