//! Strategy selection with backtest cross-validation.

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::backtest::BacktestSimulator;
use super::candle::{Candle, CandleSeries};
use super::config::{BacktestSettings, TraderConfig};
use super::error::SigtraderError;
use super::metrics::BacktestResult;
use super::signal::{Action, SignalDecision};
use super::strategy::{Strategy, default_strategies};
use crate::ports::exchange_port::ExchangePort;

/// Strategy name carried by a decision no strategy qualified for.
pub const NO_STRATEGY: &str = "none";

/// The selector's verdict plus every backtest it ran to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub decision: SignalDecision,
    pub backtests: Vec<BacktestResult>,
}

pub struct StrategySelector {
    strategies: Vec<Box<dyn Strategy>>,
    simulator: BacktestSimulator,
    backtest: BacktestSettings,
    interval: String,
    min_backtest_score: f64,
}

impl StrategySelector {
    /// `strategies[0]` is the fallback used when backtesting is disabled.
    pub fn new(strategies: Vec<Box<dyn Strategy>>, config: &TraderConfig) -> Self {
        Self {
            strategies,
            simulator: BacktestSimulator::new(&config.risk),
            backtest: config.backtest.clone(),
            interval: config.exchange.interval.clone(),
            min_backtest_score: config.risk.min_backtest_score,
        }
    }

    pub fn from_config(config: &TraderConfig) -> Self {
        Self::new(
            default_strategies(&config.indicators, config.signal_filters()),
            config,
        )
    }

    pub fn with_simulator(mut self, simulator: BacktestSimulator) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn strategies(&self) -> &[Box<dyn Strategy>] {
        &self.strategies
    }

    /// Live decision of every strategy, in order.
    pub fn evaluate_all(&self, candles: &[Candle]) -> Vec<SignalDecision> {
        self.strategies.iter().map(|s| s.compute(candles)).collect()
    }

    /// Selects using the exchange's lookback history for backtests.
    pub fn select(&self, symbol: &str, candles: &[Candle], exchange: &dyn ExchangePort) -> Selection {
        self.select_with(symbol, candles, || {
            let end = Utc::now();
            let start = end - Duration::days(self.backtest.lookback_days);
            exchange.get_historical_candles(symbol, &self.interval, start, end, self.backtest.limit)
        })
    }

    /// Selects with backtest history supplied by `load_history`, which is
    /// called at most once and only when some strategy has a signal.
    pub fn select_with<F>(&self, symbol: &str, candles: &[Candle], load_history: F) -> Selection
    where
        F: FnOnce() -> Result<CandleSeries, SigtraderError>,
    {
        if !self.backtest.enabled {
            let decision = match self.strategies.first() {
                Some(primary) => primary.compute(candles),
                None => SignalDecision::none(NO_STRATEGY),
            };
            return Selection {
                decision,
                backtests: Vec::new(),
            };
        }

        let decisions = self.evaluate_all(candles);
        let max_strength = decisions.iter().map(|d| d.strength).max().unwrap_or(0);
        let mut backtests = Vec::new();

        if decisions.iter().any(|d| d.is_actionable()) {
            match load_history() {
                Ok(history) => {
                    for (strategy, decision) in self.strategies.iter().zip(&decisions) {
                        if decision.is_actionable() {
                            backtests.push(self.simulator.run(symbol, strategy.as_ref(), &history));
                        }
                    }
                }
                Err(e) => warn!(symbol, error = %e, "backtest history unavailable"),
            }
        }

        let best = self.best_candidate(&decisions, &backtests);
        let decision = match best {
            Some((decision, score)) => {
                info!(
                    symbol,
                    strategy = %decision.strategy_name,
                    action = %decision.action,
                    score,
                    "strategy selected"
                );
                SignalDecision {
                    backtest_score: Some(score),
                    ..decision.clone()
                }
            }
            None => {
                debug!(symbol, max_strength, "no strategy qualified");
                SignalDecision {
                    action: Action::None,
                    strength: max_strength,
                    reasons: Vec::new(),
                    strategy_name: NO_STRATEGY.to_string(),
                    backtest_score: None,
                }
            }
        };

        Selection {
            decision,
            backtests,
        }
    }

    /// Highest-scoring actionable decision at or above the minimum score;
    /// ties keep the earlier strategy.
    fn best_candidate<'a>(
        &self,
        decisions: &'a [SignalDecision],
        backtests: &[BacktestResult],
    ) -> Option<(&'a SignalDecision, f64)> {
        let mut best: Option<(&SignalDecision, f64)> = None;
        for result in backtests {
            let Some(decision) = decisions
                .iter()
                .find(|d| d.is_actionable() && d.strategy_name == result.strategy_name)
            else {
                continue;
            };
            let score = result.composite_score;
            if score < self.min_backtest_score {
                continue;
            }
            if best.is_none_or(|(_, b)| score > b) {
                best = Some((decision, score));
            }
        }
        best
    }
}
