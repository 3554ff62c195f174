//! Single-position trade simulator.
//!
//! Two states: flat and in-position. Bar 0 seeds the curves and is never an
//! entry bar; from bar 1 on, a flat account enters at the close of any bar
//! whose signal is set, and an open position exits at the close of the first
//! later bar that reaches its target or stop. Capital changes only when a
//! trade closes, so the equity and drawdown curves get one point per close.
//!
//! A position still open on the last bar is not force-closed. It is reported
//! in `SimulationResult::open_position` and excluded from the trade ledger.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

use crate::domain::error::PatternIqError;
use crate::domain::ohlcv::Bar;
use crate::domain::signal::SignalSequence;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    pub starting_capital: f64,
    pub risk_percent: f64,
    pub sl_percent: f64,
    pub target_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    Target,
    #[serde(rename = "Stop-Loss")]
    StopLoss,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitReason::Target => "Target",
            ExitReason::StopLoss => "Stop-Loss",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub entry_index: usize,
    pub entry_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
}

impl OpenPosition {
    fn open(index: usize, bar: &Bar, params: &SimulationParams) -> Self {
        let entry_price = bar.close;
        OpenPosition {
            entry_index: index,
            entry_timestamp: bar.timestamp,
            entry_price,
            stop_price: entry_price * (1.0 - params.sl_percent / 100.0),
            target_price: entry_price * (1.0 + params.target_percent / 100.0),
        }
    }

    /// Target wins when a close satisfies both thresholds.
    pub fn exit_reason(&self, price: f64) -> Option<ExitReason> {
        if price >= self.target_price {
            Some(ExitReason::Target)
        } else if price <= self.stop_price {
            Some(ExitReason::StopLoss)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_timestamp: NaiveDateTime,
    pub entry_price: f64,
    pub exit_timestamp: NaiveDateTime,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub pnl_percent: f64,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl_percent > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub capital: f64,
    pub peak_equity: f64,
    pub open_position: Option<OpenPosition>,
}

impl AccountState {
    pub fn new(starting_capital: f64) -> Self {
        AccountState {
            capital: starting_capital,
            peak_equity: starting_capital,
            open_position: None,
        }
    }

    /// Percentage below the running peak, clamped to [0, 100].
    pub fn drawdown(&self) -> f64 {
        if self.peak_equity <= 0.0 {
            return 0.0;
        }
        let dd = (self.peak_equity - self.capital) / self.peak_equity * 100.0;
        if dd > 100.0 {
            tracing::warn!(
                capital = self.capital,
                peak = self.peak_equity,
                "capital below zero, drawdown clamped to 100%"
            );
        }
        dd.clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub starting_capital: f64,
    pub final_capital: f64,
    pub peak_equity: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<CurvePoint>,
    pub drawdown_curve: Vec<CurvePoint>,
    pub open_position: Option<OpenPosition>,
}

/// Capital committed to one trade.
///
/// Risk-based sizing: losing `sl_percent` of the position costs `risk_percent`
/// of capital. With no stop distance the whole account is committed.
pub fn position_size(capital: f64, risk_percent: f64, sl_percent: f64) -> f64 {
    if sl_percent > 0.0 {
        capital * (risk_percent / 100.0) / (sl_percent / 100.0)
    } else {
        capital
    }
}

pub fn simulate(
    bars: &[Bar],
    signals: &SignalSequence,
    params: &SimulationParams,
) -> Result<SimulationResult, PatternIqError> {
    if signals.len() != bars.len() {
        return Err(PatternIqError::SimulationInvariant {
            reason: format!(
                "signal length {} does not match bar count {}",
                signals.len(),
                bars.len()
            ),
        });
    }

    let mut account = AccountState::new(params.starting_capital);
    let mut trades = Vec::new();
    let mut equity_curve = Vec::new();
    let mut drawdown_curve = Vec::new();

    if let Some(first) = bars.first() {
        equity_curve.push(CurvePoint {
            timestamp: first.timestamp,
            value: account.capital,
        });
        drawdown_curve.push(CurvePoint {
            timestamp: first.timestamp,
            value: 0.0,
        });
    }

    for (i, bar) in bars.iter().enumerate().skip(1) {
        let Some(position) = account.open_position.take() else {
            if signals.get(i) {
                let position = OpenPosition::open(i, bar, params);
                tracing::trace!(
                    bar = %bar.label(),
                    entry = position.entry_price,
                    stop = position.stop_price,
                    target = position.target_price,
                    "position opened"
                );
                account.open_position = Some(position);
            }
            continue;
        };

        let Some(reason) = position.exit_reason(bar.close) else {
            account.open_position = Some(position);
            continue;
        };

        let pnl_percent = (bar.close / position.entry_price - 1.0) * 100.0;
        let size = position_size(account.capital, params.risk_percent, params.sl_percent);
        account.capital += size * (pnl_percent / 100.0);
        if !account.capital.is_finite() {
            return Err(PatternIqError::SimulationInvariant {
                reason: format!("capital became {} at {}", account.capital, bar.label()),
            });
        }
        account.peak_equity = account.peak_equity.max(account.capital);
        let drawdown = account.drawdown();
        if !drawdown.is_finite() {
            return Err(PatternIqError::SimulationInvariant {
                reason: format!("drawdown became {} at {}", drawdown, bar.label()),
            });
        }

        tracing::trace!(bar = %bar.label(), %reason, pnl_percent, capital = account.capital, "position closed");
        equity_curve.push(CurvePoint {
            timestamp: bar.timestamp,
            value: account.capital,
        });
        drawdown_curve.push(CurvePoint {
            timestamp: bar.timestamp,
            value: drawdown,
        });
        trades.push(Trade {
            entry_timestamp: position.entry_timestamp,
            entry_price: position.entry_price,
            exit_timestamp: bar.timestamp,
            exit_price: bar.close,
            exit_reason: reason,
            pnl_percent,
        });
    }

    Ok(SimulationResult {
        starting_capital: params.starting_capital,
        final_capital: account.capital,
        peak_equity: account.peak_equity,
        trades,
        equity_curve,
        drawdown_curve,
        open_position: account.open_position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::make_bars;
    use approx::assert_relative_eq;

    fn params(sl: f64, target: f64) -> SimulationParams {
        SimulationParams {
            starting_capital: 100_000.0,
            risk_percent: 1.0,
            sl_percent: sl,
            target_percent: target,
        }
    }

    fn signal_at(len: usize, indices: &[usize]) -> SignalSequence {
        let mut flags = vec![false; len];
        for &i in indices {
            flags[i] = true;
        }
        SignalSequence::new(flags)
    }

    #[test]
    fn flat_prices_leave_position_open() {
        let bars = make_bars(&[100.0; 20]);
        let result = simulate(&bars, &signal_at(20, &[5]), &params(1.0, 2.0)).unwrap();

        assert!(result.trades.is_empty());
        let open = result.open_position.expect("position stays open");
        assert_eq!(open.entry_index, 5);
        assert_relative_eq!(open.entry_price, 100.0);
        assert_relative_eq!(open.stop_price, 99.0);
        assert_relative_eq!(open.target_price, 102.0);
        assert_relative_eq!(result.final_capital, 100_000.0);
    }

    #[test]
    fn target_hit_on_next_bar() {
        let bars = make_bars(&[100.0, 100.0, 100.0, 103.0, 103.0]);
        let result = simulate(&bars, &signal_at(5, &[2]), &params(1.0, 2.0)).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::Target);
        assert_relative_eq!(trade.pnl_percent, 3.0, epsilon = 1e-9);
        assert!(trade.exit_timestamp > trade.entry_timestamp);
        // size = 100k * 1% / 1% = 100k, gain 3%
        assert_relative_eq!(result.final_capital, 103_000.0, epsilon = 1e-6);
    }

    #[test]
    fn stop_loss_exit() {
        let bars = make_bars(&[100.0, 100.0, 99.5, 98.0]);
        let result = simulate(&bars, &signal_at(4, &[1]), &params(1.0, 5.0)).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
        assert_relative_eq!(result.trades[0].pnl_percent, -2.0, epsilon = 1e-9);
        assert_relative_eq!(result.final_capital, 98_000.0, epsilon = 1e-6);
        assert_relative_eq!(result.drawdown_curve[1].value, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn zero_stop_uses_full_capital() {
        assert_relative_eq!(position_size(50_000.0, 2.0, 0.0), 50_000.0);
        assert_relative_eq!(position_size(50_000.0, 2.0, 4.0), 25_000.0);

        let bars = make_bars(&[100.0, 100.0, 110.0]);
        let result = simulate(&bars, &signal_at(3, &[1]), &params(0.0, 5.0)).unwrap();
        assert_relative_eq!(result.final_capital, 110_000.0, epsilon = 1e-6);
    }

    #[test]
    fn signal_on_first_bar_is_ignored() {
        let bars = make_bars(&[100.0, 110.0, 120.0]);
        let result = simulate(&bars, &signal_at(3, &[0]), &params(1.0, 2.0)).unwrap();
        assert!(result.trades.is_empty());
        assert!(result.open_position.is_none());
    }

    #[test]
    fn signals_ignored_while_in_position() {
        let bars = make_bars(&[100.0, 100.0, 101.0, 101.0, 105.0, 100.0, 110.0]);
        let result = simulate(&bars, &signal_at(7, &[1, 2, 3, 4, 5]), &params(5.0, 4.0)).unwrap();

        // bar 1 entry, bar 4 target exit; bar 4 signal is ignored, bar 5 re-enters, bar 6 exits
        assert_eq!(result.trades.len(), 2);
        assert_relative_eq!(result.trades[1].entry_price, 100.0);
        assert_eq!(result.trades[1].exit_reason, ExitReason::Target);
    }

    #[test]
    fn curves_have_one_point_per_close_plus_seed() {
        let bars = make_bars(&[100.0, 100.0, 103.0, 100.0, 97.0]);
        let result = simulate(&bars, &signal_at(5, &[1, 3]), &params(2.0, 2.0)).unwrap();

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.equity_curve.len(), 3);
        assert_eq!(result.drawdown_curve.len(), 3);
        assert_eq!(result.equity_curve[0].timestamp, bars[0].timestamp);
        assert_relative_eq!(result.equity_curve[0].value, 100_000.0);
        assert_relative_eq!(result.drawdown_curve[0].value, 0.0);
    }

    #[test]
    fn peak_is_non_decreasing_and_drawdown_bounded() {
        let bars = make_bars(&[100.0, 100.0, 110.0, 100.0, 80.0, 100.0, 130.0]);
        let result =
            simulate(&bars, &signal_at(7, &[1, 3, 5]), &params(5.0, 5.0)).unwrap();
        for point in &result.drawdown_curve {
            assert!((0.0..=100.0).contains(&point.value));
        }
        assert!(result.peak_equity >= result.starting_capital);
    }

    #[test]
    fn leveraged_loss_clamps_drawdown() {
        // 50% risk on a 1% stop is 50x leverage; a 20% drop wipes the account
        let p = SimulationParams {
            starting_capital: 1_000.0,
            risk_percent: 50.0,
            sl_percent: 1.0,
            target_percent: 10.0,
        };
        let bars = make_bars(&[100.0, 100.0, 80.0]);
        let result = simulate(&bars, &signal_at(3, &[1]), &p).unwrap();
        assert!(result.final_capital < 0.0);
        assert_relative_eq!(result.drawdown_curve[1].value, 100.0);
    }

    #[test]
    fn length_mismatch_is_invariant_violation() {
        let bars = make_bars(&[100.0, 101.0]);
        let err = simulate(&bars, &SignalSequence::all_false(3), &params(1.0, 2.0)).unwrap_err();
        assert!(matches!(err, PatternIqError::SimulationInvariant { .. }));
    }

    #[test]
    fn non_finite_capital_is_invariant_violation() {
        let bars = make_bars(&[100.0, 100.0, 200.0]);
        let p = SimulationParams {
            starting_capital: f64::MAX,
            risk_percent: 100.0,
            sl_percent: 0.0,
            target_percent: 1.0,
        };
        let err = simulate(&bars, &signal_at(3, &[1]), &p).unwrap_err();
        assert!(matches!(err, PatternIqError::SimulationInvariant { .. }));
    }

    #[test]
    fn rerun_is_identical() {
        let bars = make_bars(&[100.0, 100.0, 103.0, 100.0, 97.0, 101.0]);
        let signals = signal_at(6, &[1, 3, 4]);
        let a = simulate(&bars, &signals, &params(2.0, 2.0)).unwrap();
        let b = simulate(&bars, &signals, &params(2.0, 2.0)).unwrap();
        assert_eq!(a, b);
    }
}
