//! Backtest results history analysis.
//!
//! Works on the records a [`HistoryPort`](crate::ports::history_port::HistoryPort)
//! returns: per-strategy statistics, a text report and short recommendations.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::metrics::BacktestResult;

/// Window `recommendations` looks back over.
pub const RECENT_DAYS: i64 = 7;

/// A backtest result stamped with when it was run. Flat so every store can
/// keep it as a single row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestRecord {
    pub timestamp: DateTime<Utc>,
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

impl BacktestRecord {
    pub fn new(result: &BacktestResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            symbol: result.symbol.clone(),
            strategy_name: result.strategy_name.clone(),
            total_trades: result.total_trades,
            winning_trades: result.winning_trades,
            losing_trades: result.losing_trades,
            win_rate: result.win_rate,
            total_pnl_pct: result.total_pnl_pct,
            max_drawdown_pct: result.max_drawdown_pct,
            sharpe_ratio: result.sharpe_ratio,
            composite_score: result.composite_score,
        }
    }

    pub fn result(&self) -> BacktestResult {
        BacktestResult {
            symbol: self.symbol.clone(),
            strategy_name: self.strategy_name.clone(),
            total_trades: self.total_trades,
            winning_trades: self.winning_trades,
            losing_trades: self.losing_trades,
            win_rate: self.win_rate,
            total_pnl_pct: self.total_pnl_pct,
            max_drawdown_pct: self.max_drawdown_pct,
            sharpe_ratio: self.sharpe_ratio,
            composite_score: self.composite_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolScore {
    pub symbol: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyPerformance {
    pub strategy_name: String,
    pub period_days: i64,
    pub total_backtests: usize,
    pub avg_score: f64,
    pub avg_win_rate: f64,
    pub avg_total_pnl_pct: f64,
    pub avg_max_drawdown_pct: f64,
    pub avg_sharpe_ratio: f64,
    pub symbols_tested: usize,
    /// Up to five records, highest score first.
    pub best_symbols: Vec<SymbolScore>,
    /// Up to five records, lowest score first.
    pub worst_symbols: Vec<SymbolScore>,
}

fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Stable score ordering, highest first; NaN scores sort last.
fn by_score_desc(a: &&BacktestRecord, b: &&BacktestRecord) -> std::cmp::Ordering {
    b.composite_score.total_cmp(&a.composite_score)
}

/// Statistics for `strategy` over records from the last `days` days.
/// Returns `None` when there are no such records.
pub fn strategy_performance(
    records: &[BacktestRecord],
    strategy: &str,
    days: i64,
    now: DateTime<Utc>,
) -> Option<StrategyPerformance> {
    let cutoff = now - Duration::days(days);
    let recent: Vec<&BacktestRecord> = records
        .iter()
        .filter(|r| r.strategy_name == strategy && r.timestamp >= cutoff)
        .collect();
    if recent.is_empty() {
        return None;
    }

    let mut ranked = recent.clone();
    ranked.sort_by(by_score_desc);
    let to_score = |r: &&BacktestRecord| SymbolScore {
        symbol: r.symbol.clone(),
        score: r.composite_score,
    };

    Some(StrategyPerformance {
        strategy_name: strategy.to_string(),
        period_days: days,
        total_backtests: recent.len(),
        avg_score: mean(recent.iter().map(|r| r.composite_score)),
        avg_win_rate: mean(recent.iter().map(|r| r.win_rate)),
        avg_total_pnl_pct: mean(recent.iter().map(|r| r.total_pnl_pct)),
        avg_max_drawdown_pct: mean(recent.iter().map(|r| r.max_drawdown_pct)),
        avg_sharpe_ratio: mean(recent.iter().map(|r| r.sharpe_ratio)),
        symbols_tested: recent.iter().map(|r| r.symbol.as_str()).collect::<HashSet<_>>().len(),
        best_symbols: ranked.iter().take(5).map(to_score).collect(),
        worst_symbols: ranked.iter().rev().take(5).map(to_score).collect(),
    })
}

/// Strategy names in order of first appearance.
fn strategy_names(records: &[BacktestRecord]) -> Vec<&str> {
    let mut seen = HashSet::new();
    records
        .iter()
        .map(|r| r.strategy_name.as_str())
        .filter(|name| seen.insert(*name))
        .collect()
}

/// Text report over the whole history: overall averages, a per-strategy
/// comparison and the ten best-scoring records.
pub fn performance_report(records: &[BacktestRecord], now: DateTime<Utc>) -> String {
    if records.is_empty() {
        return "No backtest results available.".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "=== TRADING STRATEGY PERFORMANCE REPORT ===");
    let _ = writeln!(out, "Generated: {}", now.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out);
    let _ = writeln!(out, "OVERALL STATISTICS:");
    let _ = writeln!(out, "- Total Backtests: {}", records.len());
    let _ = writeln!(
        out,
        "- Average Score: {:.1}",
        mean(records.iter().map(|r| r.composite_score))
    );
    let _ = writeln!(
        out,
        "- Average Win Rate: {:.2}%",
        mean(records.iter().map(|r| r.win_rate)) * 100.0
    );
    let _ = writeln!(
        out,
        "- Average PnL: {:.2}%",
        mean(records.iter().map(|r| r.total_pnl_pct)) * 100.0
    );
    let _ = writeln!(
        out,
        "- Average Max Drawdown: {:.2}%",
        mean(records.iter().map(|r| r.max_drawdown_pct)) * 100.0
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "STRATEGY COMPARISON:");

    for name in strategy_names(records) {
        let rows: Vec<&BacktestRecord> = records.iter().filter(|r| r.strategy_name == name).collect();
        let _ = writeln!(out);
        let _ = writeln!(out, "{}:", name.to_uppercase());
        let _ = writeln!(out, "  - Tests: {}", rows.len());
        let _ = writeln!(out, "  - Avg Score: {:.1}", mean(rows.iter().map(|r| r.composite_score)));
        let _ = writeln!(
            out,
            "  - Avg Win Rate: {:.2}%",
            mean(rows.iter().map(|r| r.win_rate)) * 100.0
        );
        let _ = writeln!(
            out,
            "  - Avg PnL: {:.2}%",
            mean(rows.iter().map(|r| r.total_pnl_pct)) * 100.0
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "TOP 10 BEST PERFORMING SYMBOLS:");
    let mut ranked: Vec<&BacktestRecord> = records.iter().collect();
    ranked.sort_by(by_score_desc);
    for r in ranked.iter().take(10) {
        let _ = writeln!(
            out,
            "  {}: {:.1} ({}, WR: {:.1}%)",
            r.symbol,
            r.composite_score,
            r.strategy_name,
            r.win_rate * 100.0
        );
    }

    out
}

/// Short recommendations from the last [`RECENT_DAYS`] of history.
pub fn recommendations(records: &[BacktestRecord], now: DateTime<Utc>) -> Vec<String> {
    if records.is_empty() {
        return vec!["No data available for recommendations".to_string()];
    }

    let cutoff = now - Duration::days(RECENT_DAYS);
    let recent: Vec<BacktestRecord> = records.iter().filter(|r| r.timestamp >= cutoff).cloned().collect();
    if recent.is_empty() {
        return vec!["Insufficient recent data".to_string()];
    }

    let mut out = Vec::new();

    let names = strategy_names(&recent);
    let best = names
        .iter()
        .map(|name| {
            let score = mean(
                recent
                    .iter()
                    .filter(|r| r.strategy_name == *name)
                    .map(|r| r.composite_score),
            );
            (*name, score)
        })
        .fold(None::<(&str, f64)>, |best, (name, score)| match best {
            Some((_, b)) if score <= b => best,
            _ => Some((name, score)),
        });
    if let Some((name, _)) = best {
        out.push(format!(
            "Best performing strategy (last {} days): {}",
            RECENT_DAYS, name
        ));
    }

    let high_win_rate: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| recent.iter().any(|r| r.strategy_name == *name && r.win_rate > 0.6))
        .collect();
    if !high_win_rate.is_empty() {
        out.push(format!("High win rate strategies: {}", high_win_rate.join(", ")));
    }

    let low_drawdown: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| {
            recent
                .iter()
                .any(|r| r.strategy_name == *name && r.max_drawdown_pct < 0.1)
        })
        .collect();
    if !low_drawdown.is_empty() {
        out.push(format!("Low drawdown strategies: {}", low_drawdown.join(", ")));
    }

    let mut by_symbol: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for r in &recent {
        by_symbol.entry(r.symbol.as_str()).or_default().push(r.composite_score);
    }
    let consistent: Vec<&str> = by_symbol
        .iter()
        .filter(|(_, scores)| scores.len() >= 2 && mean(scores.iter().copied()) > 60.0)
        .map(|(symbol, _)| *symbol)
        .take(5)
        .collect();
    if !consistent.is_empty() {
        out.push(format!("Consistently good symbols: {}", consistent.join(", ")));
    }

    out
}
