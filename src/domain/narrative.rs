//! Backtest commentary.
//!
//! `report_facts` is the data block every narrator sees. `render_local_narrative`
//! fills the analyst Markdown skeleton deterministically from the summary; it is
//! the offline narrator and the fallback when the remote one fails.

use crate::domain::backtest::BacktestRequest;
use crate::domain::metrics::{PROFIT_FACTOR_SENTINEL, PerformanceSummary};

/// Group the integer part of `value` in thousands, e.g. `-12,346`.
pub fn format_thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if rounded < 0.0 {
        out.insert(0, '-');
    }
    out
}

/// Bulleted report data shared by the local and remote narrators.
pub fn report_facts(summary: &PerformanceSummary, request: &BacktestRequest) -> String {
    format!(
        "- **Symbol:** {symbol}\n\
         - **Strategy:** '{strategy}'\n\
         - **Risk Config:** {sl}% SL, {tgt}% TGT\n\
         - **Final Equity:** ₹{equity}\n\
         - **Net Profit/Loss:** ₹{pnl} ({pnl_pct:.2}%)\n\
         - **Win Rate:** {win_rate:.2}%\n\
         - **Profit Factor:** {pf:.2}\n\
         - **Max Drawdown:** {dd:.2}%\n\
         - **Total Trades:** {trades}",
        symbol = request.symbol,
        strategy = request.strategy_text,
        sl = request.sl_percent,
        tgt = request.target_percent,
        equity = format_thousands(summary.final_equity),
        pnl = format_thousands(summary.pnl),
        pnl_pct = summary.pnl_percent,
        win_rate = summary.win_rate,
        pf = summary.profit_factor,
        dd = summary.max_drawdown,
        trades = summary.num_trades,
    )
}

pub fn render_local_narrative(summary: &PerformanceSummary, request: &BacktestRequest) -> String {
    format!(
        "### Executive Summary\n{executive}\n\n\
         ### Performance Breakdown\n\
         **Profitability:** {profitability}\n\
         **Risk Management:** {risk}\n\n\
         ### Actionable Insight & Suggestion\n{insight}",
        executive = executive_summary(summary, request),
        profitability = profitability(summary),
        risk = risk_management(summary),
        insight = insight(summary, request),
    )
}

fn executive_summary(s: &PerformanceSummary, request: &BacktestRequest) -> String {
    if s.num_trades == 0 {
        return format!(
            "The strategy produced no closed trades on {} ({}), so equity is unchanged.",
            request.symbol, request.interval
        );
    }
    let verdict = if s.is_profitable() {
        "was profitable"
    } else {
        "was not profitable"
    };
    format!(
        "The strategy {verdict} on {symbol} ({interval}), returning {pnl_pct:.2}% over {n} trades \
         with a profit factor of {pf:.2} and a maximum drawdown of {dd:.2}%.",
        symbol = request.symbol,
        interval = request.interval,
        pnl_pct = s.pnl_percent,
        n = s.num_trades,
        pf = s.profit_factor,
        dd = s.max_drawdown,
    )
}

fn profitability(s: &PerformanceSummary) -> String {
    if s.num_trades == 0 {
        return "Not applicable without closed trades.".into();
    }
    let pf = if s.profit_factor >= PROFIT_FACTOR_SENTINEL {
        "no losing trades were recorded".to_string()
    } else {
        format!("winners earned {:.2} times what losers gave back", s.profit_factor)
    };
    format!(
        "{won} of {n} trades won ({wr:.2}%); {pf}. Average win {aw:.2}%, average loss {al:.2}%.",
        won = s.trades_won,
        n = s.num_trades,
        wr = s.win_rate,
        aw = s.avg_win_percent,
        al = s.avg_loss_percent,
    )
}

fn risk_management(s: &PerformanceSummary) -> String {
    if s.max_drawdown == 0.0 {
        return "Equity never fell below its running peak.".into();
    }
    let ratio = if s.max_drawdown > 0.0 {
        s.pnl_percent / s.max_drawdown
    } else {
        0.0
    };
    format!(
        "Maximum drawdown was {dd:.2}% against a {pnl:.2}% return (return/drawdown {ratio:.2}).",
        dd = s.max_drawdown,
        pnl = s.pnl_percent,
    )
}

fn insight(s: &PerformanceSummary, request: &BacktestRequest) -> String {
    if s.num_trades == 0 {
        let open = if s.position_open_at_end {
            " A position was opened but never reached its stop or target before the data ended."
        } else {
            ""
        };
        return format!(
            "No entry completed in the tested window.{open} Consider a wider target than {:.2}% \
             or a longer interval so the entry condition has room to trigger and resolve.",
            request.target_percent
        );
    }
    if !s.is_profitable() {
        return format!(
            "Losses outweighed gains. Try a target above {:.2}% or a stop tighter than {:.2}% \
             to improve the reward-to-risk ratio.",
            request.target_percent, request.sl_percent
        );
    }
    format!(
        "The edge held in this sample. Validate it on another symbol or interval before \
         raising risk above {:.2}% per trade.",
        request.risk_percent
    )
}
