//! Performance summary.
//!
//! Pure reduction of a simulation's trade ledger and curves. Percentages are
//! on a 0-100 scale. A trade with pnl_percent <= 0 counts as a loss.

use serde::Serialize;

use super::simulator::SimulationResult;

/// Profit factor reported when there are no losing trades.
pub const PROFIT_FACTOR_SENTINEL: f64 = 999.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub starting_capital: f64,
    pub final_equity: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub max_drawdown: f64,
    pub num_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub avg_win_percent: f64,
    pub avg_loss_percent: f64,
    pub largest_win_percent: f64,
    pub largest_loss_percent: f64,
    pub position_open_at_end: bool,
}

impl PerformanceSummary {
    pub fn compute(result: &SimulationResult) -> Self {
        let starting_capital = result.starting_capital;
        let final_equity = result.final_capital;
        let pnl = final_equity - starting_capital;
        let pnl_percent = if starting_capital > 0.0 {
            pnl / starting_capital * 100.0
        } else {
            0.0
        };

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for trade in &result.trades {
            let pnl = trade.pnl_percent;
            if trade.is_win() {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            }
        }

        let num_trades = result.trades.len();
        let win_rate = if num_trades > 0 {
            trades_won as f64 / num_trades as f64 * 100.0
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else {
            PROFIT_FACTOR_SENTINEL
        };

        let avg_win_percent = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };
        let avg_loss_percent = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let max_drawdown = result
            .drawdown_curve
            .iter()
            .map(|p| p.value)
            .fold(0.0_f64, f64::max);

        PerformanceSummary {
            starting_capital,
            final_equity,
            pnl,
            pnl_percent,
            win_rate,
            profit_factor,
            max_drawdown,
            num_trades,
            trades_won,
            trades_lost,
            avg_win_percent,
            avg_loss_percent,
            largest_win_percent: largest_win,
            largest_loss_percent: largest_loss,
            position_open_at_end: result.open_position.is_some(),
        }
    }

    pub fn is_profitable(&self) -> bool {
        self.pnl > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::simulator::{CurvePoint, ExitReason, Trade};
    use approx::assert_relative_eq;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    fn trade(day: u32, pnl_percent: f64) -> Trade {
        Trade {
            entry_timestamp: ts(day),
            entry_price: 100.0,
            exit_timestamp: ts(day + 1),
            exit_price: 100.0 * (1.0 + pnl_percent / 100.0),
            exit_reason: if pnl_percent > 0.0 {
                ExitReason::Target
            } else {
                ExitReason::StopLoss
            },
            pnl_percent,
        }
    }

    fn result(trades: Vec<Trade>, final_capital: f64, drawdowns: &[f64]) -> SimulationResult {
        SimulationResult {
            starting_capital: 10_000.0,
            final_capital,
            peak_equity: final_capital.max(10_000.0),
            trades,
            equity_curve: vec![],
            drawdown_curve: drawdowns
                .iter()
                .enumerate()
                .map(|(i, &v)| CurvePoint {
                    timestamp: ts(i as u32 + 1),
                    value: v,
                })
                .collect(),
            open_position: None,
        }
    }

    #[test]
    fn empty_ledger_defaults() {
        let s = PerformanceSummary::compute(&result(vec![], 10_000.0, &[0.0]));
        assert_eq!(s.num_trades, 0);
        assert_relative_eq!(s.win_rate, 0.0);
        assert_relative_eq!(s.profit_factor, PROFIT_FACTOR_SENTINEL);
        assert_relative_eq!(s.max_drawdown, 0.0);
        assert_relative_eq!(s.pnl, 0.0);
        assert!(!s.is_profitable());
    }

    #[test]
    fn mixed_trades() {
        let trades = vec![trade(1, 4.0), trade(3, -2.0), trade(5, 2.0), trade(7, -1.0)];
        let s = PerformanceSummary::compute(&result(trades, 10_300.0, &[0.0, 0.0, 1.9, 0.0, 0.9]));

        assert_eq!(s.num_trades, 4);
        assert_eq!(s.trades_won, 2);
        assert_eq!(s.trades_lost, 2);
        assert_relative_eq!(s.win_rate, 50.0);
        assert_relative_eq!(s.profit_factor, 2.0);
        assert_relative_eq!(s.max_drawdown, 1.9);
        assert_relative_eq!(s.pnl, 300.0);
        assert_relative_eq!(s.pnl_percent, 3.0);
        assert_relative_eq!(s.avg_win_percent, 3.0);
        assert_relative_eq!(s.avg_loss_percent, 1.5);
        assert_relative_eq!(s.largest_win_percent, 4.0);
        assert_relative_eq!(s.largest_loss_percent, 2.0);
    }

    #[test]
    fn breakeven_counts_as_loss() {
        let s = PerformanceSummary::compute(&result(vec![trade(1, 0.0)], 10_000.0, &[0.0, 0.0]));
        assert_eq!(s.trades_lost, 1);
        assert_relative_eq!(s.win_rate, 0.0);
        // losses sum to zero, so the sentinel applies
        assert_relative_eq!(s.profit_factor, PROFIT_FACTOR_SENTINEL);
    }

    #[test]
    fn all_winners_use_sentinel() {
        let s = PerformanceSummary::compute(&result(
            vec![trade(1, 3.0), trade(4, 1.0)],
            10_400.0,
            &[0.0, 0.0, 0.0],
        ));
        assert_relative_eq!(s.win_rate, 100.0);
        assert_relative_eq!(s.profit_factor, PROFIT_FACTOR_SENTINEL);
        assert!(s.is_profitable());
    }

    #[test]
    fn open_position_is_flagged() {
        let mut r = result(vec![], 10_000.0, &[0.0]);
        r.open_position = Some(crate::domain::simulator::OpenPosition {
            entry_index: 3,
            entry_timestamp: ts(4),
            entry_price: 100.0,
            stop_price: 99.0,
            target_price: 102.0,
        });
        assert!(PerformanceSummary::compute(&r).position_open_at_end);
    }
}
