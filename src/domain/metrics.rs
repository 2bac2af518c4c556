//! Backtest trade statistics and the composite score.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::signal::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Buy opens a long, Sell a short, None opens nothing.
    pub fn from_action(action: Action) -> Option<Direction> {
        match action {
            Action::Buy => Some(Direction::Long),
            Action::Sell => Some(Direction::Short),
            Action::None => None,
        }
    }

    /// The signal that would close a position in this direction early.
    pub fn opposing_action(self) -> Action {
        match self {
            Direction::Long => Action::Sell,
            Direction::Short => Action::Buy,
        }
    }

    /// Fractional return of a position opened at `entry` and marked at `price`.
    pub fn pnl_pct(self, entry: f64, price: f64) -> f64 {
        match self {
            Direction::Long => (price - entry) / entry,
            Direction::Short => (entry - price) / entry,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestTrade {
    pub entry_price: f64,
    pub exit_price: f64,
    pub direction: Direction,
    pub pnl_pct: f64,
    pub is_win: bool,
}

impl BacktestTrade {
    pub fn close(direction: Direction, entry_price: f64, exit_price: f64) -> Self {
        let pnl_pct = direction.pnl_pct(entry_price, exit_price);
        Self {
            entry_price,
            exit_price,
            direction,
            pnl_pct,
            is_win: pnl_pct > 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy_name: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub composite_score: f64,
}

impl BacktestResult {
    /// All-zero result; also returned whenever a run cannot be computed.
    pub fn empty(symbol: &str, strategy_name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            strategy_name: strategy_name.to_string(),
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            total_pnl_pct: 0.0,
            max_drawdown_pct: 0.0,
            sharpe_ratio: 0.0,
            composite_score: 0.0,
        }
    }

    pub fn from_trades(symbol: &str, strategy_name: &str, trades: &[BacktestTrade]) -> Self {
        if trades.is_empty() {
            return Self::empty(symbol, strategy_name);
        }

        let total_trades = trades.len();
        let winning_trades = trades.iter().filter(|t| t.is_win).count();
        let returns: Vec<f64> = trades.iter().map(|t| t.pnl_pct).collect();

        let win_rate = winning_trades as f64 / total_trades as f64;
        let total_pnl_pct: f64 = returns.iter().sum();
        let max_drawdown_pct = max_drawdown(&returns);
        let sharpe_ratio = sharpe_ratio(&returns);

        Self {
            symbol: symbol.to_string(),
            strategy_name: strategy_name.to_string(),
            total_trades,
            winning_trades,
            losing_trades: total_trades - winning_trades,
            win_rate,
            total_pnl_pct,
            max_drawdown_pct,
            sharpe_ratio,
            composite_score: composite_score(win_rate, total_pnl_pct, max_drawdown_pct, sharpe_ratio),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_trades == 0
    }
}

/// Largest `(peak − cumulative) / (1 + peak)` over the running sum of
/// returns. The peak starts at zero and drawdown only counts once it is
/// positive.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;

    for r in returns {
        cumulative += r;
        if cumulative > peak {
            peak = cumulative;
        }
        let dd = if peak > 0.0 {
            (peak - cumulative) / (1.0 + peak)
        } else {
            0.0
        };
        max_dd = max_dd.max(dd);
    }

    max_dd
}

/// Per-trade Sharpe: `mean / σ · √N` with the population deviation.
/// Zero for fewer than two trades or no dispersion.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        mean / stddev * n.sqrt()
    } else {
        0.0
    }
}

/// `winRate·40 + min(pnl·100, 30) + max(30 − dd·100, 0) + min(sharpe·10, 30)`
pub fn composite_score(win_rate: f64, total_pnl_pct: f64, max_drawdown_pct: f64, sharpe: f64) -> f64 {
    win_rate * 40.0
        + (total_pnl_pct * 100.0).min(30.0)
        + (30.0 - max_drawdown_pct * 100.0).max(0.0)
        + (sharpe * 10.0).min(30.0)
}
