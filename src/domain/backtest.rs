//! Walk-forward backtest simulator.
//!
//! Replays a candle series bar by bar through a strategy's simplified rule
//! ([`Strategy::replay_signals`]), holding at most one position at a time.
//! Entries and exits fill at the bar's close. A position still open when the
//! replay ends is discarded.

use tracing::{info, warn};

use super::candle::{Candle, validate_candles};
use super::config::RiskParameters;
use super::error::SigtraderError;
use super::metrics::{BacktestResult, BacktestTrade, Direction};
use super::signal::Action;
use super::strategy::Strategy;

/// First bar index at which the replay may trade.
pub const REPLAY_START_BAR: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
enum PositionState {
    Flat,
    Open { direction: Direction, entry_price: f64 },
}

#[derive(Debug, Clone)]
pub struct BacktestSimulator {
    take_profit_pct: f64,
    stop_loss_pct: f64,
    start_bar: usize,
}

impl BacktestSimulator {
    pub fn new(risk: &RiskParameters) -> Self {
        Self {
            take_profit_pct: risk.take_profit_pct,
            stop_loss_pct: risk.stop_loss_pct,
            start_bar: REPLAY_START_BAR,
        }
    }

    /// Overrides the first tradable bar.
    pub fn with_start_bar(mut self, start_bar: usize) -> Self {
        self.start_bar = start_bar;
        self
    }

    /// Runs `strategy` over `candles`.
    ///
    /// Never fails: no trades, or any data problem, yields the all-zero
    /// result for `(symbol, strategy)`.
    pub fn run(&self, symbol: &str, strategy: &dyn Strategy, candles: &[Candle]) -> BacktestResult {
        let signals = strategy.replay_signals(candles);
        match self.replay(&signals, candles) {
            Ok(trades) => {
                let result = BacktestResult::from_trades(symbol, strategy.name(), &trades);
                info!(
                    symbol,
                    strategy = strategy.name(),
                    score = result.composite_score,
                    win_rate = result.win_rate,
                    pnl = result.total_pnl_pct,
                    trades = result.total_trades,
                    "backtest complete"
                );
                result
            }
            Err(e) => {
                warn!(symbol, strategy = strategy.name(), error = %e, "backtest failed");
                BacktestResult::empty(symbol, strategy.name())
            }
        }
    }

    /// The position state machine over precomputed per-bar signals.
    ///
    /// Bars `start_bar..len-1` are visited (the final bar is excluded). A flat
    /// book opens on Buy/Sell; an open position closes when its return
    /// reaches the take-profit, falls to the stop-loss, or an opposing signal
    /// appears. The entry bar never exits and the exit bar never re-enters.
    pub fn replay(
        &self,
        signals: &[Action],
        candles: &[Candle],
    ) -> Result<Vec<BacktestTrade>, SigtraderError> {
        if signals.len() != candles.len() {
            return Err(SigtraderError::data(format!(
                "{} signals for {} bars",
                signals.len(),
                candles.len()
            )));
        }
        validate_candles(candles)?;

        let mut trades = Vec::new();
        let mut state = PositionState::Flat;
        let end = candles.len().saturating_sub(1);

        for i in self.start_bar..end {
            let price = candles[i].close;
            let signal = signals[i];

            state = match state {
                PositionState::Flat => match Direction::from_action(signal) {
                    Some(direction) => PositionState::Open {
                        direction,
                        entry_price: price,
                    },
                    None => PositionState::Flat,
                },
                PositionState::Open {
                    direction,
                    entry_price,
                } => {
                    let pnl = direction.pnl_pct(entry_price, price);
                    let exit = pnl >= self.take_profit_pct
                        || pnl <= -self.stop_loss_pct
                        || signal == direction.opposing_action();
                    if exit {
                        trades.push(BacktestTrade::close(direction, entry_price, price));
                        PositionState::Flat
                    } else {
                        state
                    }
                }
            };
        }

        Ok(trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::{IndicatorParams, SignalFilters};
    use crate::domain::strategy::default_strategies;
    use crate::domain::strategy::testing::{bars, wavy_closes};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn simulator() -> BacktestSimulator {
        BacktestSimulator::new(&RiskParameters::default()).with_start_bar(0)
    }

    #[test]
    fn take_profit_closes_long() {
        let candles = bars(&[100.0, 101.0, 102.5, 103.0, 104.0]);
        let signals = [Action::Buy, Action::None, Action::None, Action::None, Action::None];
        let trades = simulator().replay(&signals, &candles).unwrap();

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].direction, Direction::Long);
        assert_relative_eq!(trades[0].exit_price, 102.5);
        assert!(trades[0].is_win);
    }

    #[test]
    fn stop_loss_closes_short() {
        let candles = bars(&[100.0, 100.5, 101.6, 99.0, 99.0]);
        let signals = [Action::Sell, Action::None, Action::None, Action::None, Action::None];
        let trades = simulator().replay(&signals, &candles).unwrap();

        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].direction, Direction::Short);
        assert_relative_eq!(trades[0].pnl_pct, -0.016, epsilon = 1e-12);
        assert!(!trades[0].is_win);
    }

    #[test]
    fn opposing_signal_exits_without_reentry() {
        let candles = bars(&[100.0, 100.2, 100.4, 100.6, 100.8, 101.0]);
        let signals = [
            Action::Buy,
            Action::None,
            Action::Sell,
            Action::Sell,
            Action::None,
            Action::None,
        ];
        let trades = simulator().replay(&signals, &candles).unwrap();

        // exit on bar 2, re-entry short on bar 3, still open at the end
        assert_eq!(trades.len(), 1);
        assert_relative_eq!(trades[0].exit_price, 100.4);
    }

    #[test]
    fn same_direction_signal_keeps_position() {
        let candles = bars(&[100.0, 100.1, 100.2, 100.3]);
        let signals = [Action::Buy, Action::Buy, Action::Buy, Action::None];
        let trades = simulator().replay(&signals, &candles).unwrap();
        assert!(trades.is_empty());
    }

    #[test]
    fn last_bar_is_not_replayed() {
        let candles = bars(&[100.0, 100.0, 150.0]);
        let signals = [Action::Buy, Action::None, Action::None];
        let trades = simulator().replay(&signals, &candles).unwrap();
        assert!(trades.is_empty());
    }

    #[test]
    fn misaligned_signals_are_rejected() {
        let candles = bars(&[100.0, 101.0]);
        assert!(simulator().replay(&[Action::Buy], &candles).is_err());
    }

    #[test]
    fn bad_data_yields_zero_result() {
        let mut candles = bars(&wavy_closes(260));
        candles[230].close = 0.0;
        let strategies = default_strategies(&IndicatorParams::default(), SignalFilters::default());
        let sim = BacktestSimulator::new(&RiskParameters::default());
        let result = sim.run("BTCUSDT", strategies[0].as_ref(), &candles);
        assert_eq!(result, BacktestResult::empty("BTCUSDT", "rsi_bb_vwap"));
    }

    #[test]
    fn short_history_has_no_trades() {
        let candles = bars(&wavy_closes(150));
        let strategies = default_strategies(&IndicatorParams::default(), SignalFilters::default());
        let sim = BacktestSimulator::new(&RiskParameters::default());
        for s in &strategies {
            let result = sim.run("ETHUSDT", s.as_ref(), &candles);
            assert!(result.is_empty());
            assert_eq!(result.strategy_name, s.name());
        }
    }

    proptest! {
        #[test]
        fn replay_is_deterministic(
            steps in prop::collection::vec(-0.02f64..0.02, 220..320),
            which in 0usize..3,
        ) {
            let mut closes = Vec::with_capacity(steps.len());
            let mut price = 100.0;
            for s in &steps {
                price *= 1.0 + s;
                closes.push(price);
            }
            let candles = bars(&closes);
            let strategies = default_strategies(&IndicatorParams::default(), SignalFilters::default());
            let sim = BacktestSimulator::new(&RiskParameters::default());

            let first = sim.run("SOLUSDT", strategies[which].as_ref(), &candles);
            let second = sim.run("SOLUSDT", strategies[which].as_ref(), &candles);
            prop_assert_eq!(first, second);
        }
    }
}
