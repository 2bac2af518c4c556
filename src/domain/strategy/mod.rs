//! Signal strategies.
//!
//! Each strategy evaluates the latest closed bar of a candle series with its
//! full multi-filter rule ([`Strategy::evaluate`]) and can also replay a
//! simplified single-indicator rule over every bar for the backtest
//! simulator ([`Strategy::replay_signals`]).

pub mod macd_ema_volume;
pub mod oscillator_band_vwap;
pub mod stochastic_fib_trend;

pub use macd_ema_volume::MacdEmaVolume;
pub use oscillator_band_vwap::OscillatorBandVwap;
pub use stochastic_fib_trend::StochasticFibTrend;

use tracing::{debug, warn};

use super::candle::Candle;
use super::config::{IndicatorParams, SignalFilters};
use super::error::SigtraderError;
use super::indicator::IndicatorSeries;
use super::signal::{Action, SignalDecision};

/// Bars required before any strategy evaluates.
pub const WARMUP_BARS: usize = 50;

pub trait Strategy {
    /// Stable identifier, also used as the backtest strategy name.
    fn name(&self) -> &'static str;

    /// Full rule on the last bar. Errors are degraded by [`Strategy::compute`].
    fn evaluate(&self, candles: &[Candle]) -> Result<SignalDecision, SigtraderError>;

    /// Primary-condition signal at every bar, using only bars up to that index.
    fn replay_signals(&self, candles: &[Candle]) -> Vec<Action>;

    /// Evaluate the series; never fails.
    ///
    /// Short input yields `{None, 0, []}`; any computation error yields
    /// `{None, 0, [error text]}`.
    fn compute(&self, candles: &[Candle]) -> SignalDecision {
        if candles.len() < WARMUP_BARS {
            debug!(
                strategy = self.name(),
                bars = candles.len(),
                "not enough bars to evaluate"
            );
            return SignalDecision::none(self.name());
        }

        match self.evaluate(candles) {
            Ok(decision) => {
                debug!(
                    strategy = self.name(),
                    action = %decision.action,
                    strength = decision.strength,
                    "strategy evaluated"
                );
                decision
            }
            Err(e) => {
                warn!(strategy = self.name(), error = %e, "strategy degraded to no signal");
                SignalDecision::none_with_reason(self.name(), format!("Error: {}", e))
            }
        }
    }
}

/// The three strategies in evaluation order; the oscillator/band/VWAP
/// variant comes first and is the one used when backtesting is disabled.
pub fn default_strategies(
    params: &IndicatorParams,
    filters: SignalFilters,
) -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(OscillatorBandVwap::new(params.clone(), filters)),
        Box::new(MacdEmaVolume::new(params.clone(), filters)),
        Box::new(StochasticFibTrend::new(params.clone())),
    ]
}

pub fn strategy_by_name(
    name: &str,
    params: &IndicatorParams,
    filters: SignalFilters,
) -> Option<Box<dyn Strategy>> {
    default_strategies(params, filters)
        .into_iter()
        .find(|s| s.name() == name)
}

/// `(prev, last)` bar indices; fewer than two bars is `InsufficientData`.
pub(crate) fn last_two(candles: &[Candle], strategy: &str) -> Result<(usize, usize), SigtraderError> {
    match candles.len() {
        0 | 1 => Err(SigtraderError::InsufficientData {
            what: strategy.to_string(),
            bars: candles.len(),
            minimum: 2,
        }),
        n => Ok((n - 2, n - 1)),
    }
}

/// Previous value below `level`, current at or above it.
pub(crate) fn crossed_up(prev: f64, curr: f64, level: f64) -> bool {
    prev < level && curr >= level
}

/// Previous value above `level`, current at or below it.
pub(crate) fn crossed_down(prev: f64, curr: f64, level: f64) -> bool {
    prev > level && curr <= level
}

/// Replays `rule(series, prev_index, index)` for every bar; bars where the
/// rule cannot be evaluated yield `Action::None`.
pub(crate) fn replay_with<F>(series: &IndicatorSeries, rule: F) -> Vec<Action>
where
    F: Fn(&IndicatorSeries, usize, usize) -> Result<Action, SigtraderError>,
{
    (0..series.values.len())
        .map(|i| {
            if i == 0 {
                return Action::None;
            }
            rule(series, i - 1, i).unwrap_or(Action::None)
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use testing::{bars, wavy_closes};

    #[test]
    fn crosses() {
        assert!(crossed_up(29.0, 31.0, 30.0));
        assert!(crossed_up(29.9, 30.0, 30.0));
        assert!(!crossed_up(30.0, 31.0, 30.0));
        assert!(crossed_down(71.0, 69.0, 70.0));
        assert!(!crossed_down(70.0, 69.0, 70.0));
    }

    #[test]
    fn short_series_yields_none_for_every_strategy() {
        let strategies = default_strategies(&IndicatorParams::default(), SignalFilters::default());
        let candles = bars(&wavy_closes(WARMUP_BARS - 1));
        for s in &strategies {
            let d = s.compute(&candles);
            assert_eq!(d.action, Action::None, "{}", s.name());
            assert_eq!(d.strength, 0);
            assert!(d.reasons.is_empty());
        }
    }

    #[test]
    fn missing_trend_history_degrades_with_reason() {
        let s = OscillatorBandVwap::new(IndicatorParams::default(), SignalFilters::default());
        // enough for warm-up, not for EMA(200)
        let d = s.compute(&bars(&wavy_closes(120)));
        assert_eq!(d.action, Action::None);
        assert_eq!(d.strength, 0);
        assert_eq!(d.reasons.len(), 1);
        assert!(d.reasons[0].contains("EMA(200)"));
    }

    #[test]
    fn evaluate_rejects_fewer_than_two_bars() {
        let strategies = default_strategies(&IndicatorParams::default(), SignalFilters::default());
        for s in &strategies {
            for candles in [Vec::new(), bars(&[100.0])] {
                let err = s.evaluate(&candles).unwrap_err();
                assert!(
                    matches!(err, SigtraderError::InsufficientData { bars, minimum: 2, .. } if bars == candles.len()),
                    "{}: {}",
                    s.name(),
                    err
                );
            }
            assert!(s.replay_signals(&[]).is_empty());
        }
    }

    #[test]
    fn lookup_by_name() {
        let params = IndicatorParams::default();
        let filters = SignalFilters::default();
        for name in ["rsi_bb_vwap", "macd_ema_vol", "stoch_fib_trend"] {
            let s = strategy_by_name(name, &params, filters).unwrap();
            assert_eq!(s.name(), name);
        }
        assert!(strategy_by_name("unknown", &params, filters).is_none());
    }

    #[test]
    fn default_order_starts_with_oscillator_variant() {
        let strategies = default_strategies(&IndicatorParams::default(), SignalFilters::default());
        let names: Vec<&str> = strategies.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["rsi_bb_vwap", "macd_ema_vol", "stoch_fib_trend"]);
    }

    #[test]
    fn replay_is_aligned_with_bars() {
        let candles = bars(&wavy_closes(300));
        for s in default_strategies(&IndicatorParams::default(), SignalFilters::default()) {
            assert_eq!(s.replay_signals(&candles).len(), candles.len());
        }
    }

    #[test]
    fn decisions_with_action_carry_strength_and_reasons() {
        let candles = bars(&wavy_closes(400));
        let filters = SignalFilters {
            min_signal_strength: 1,
            volume_threshold: 0.5,
        };
        for s in default_strategies(&IndicatorParams::default(), filters) {
            for end in WARMUP_BARS..=candles.len() {
                let d = s.compute(&candles[..end]);
                if d.action != Action::None {
                    assert!(d.strength >= 1);
                    assert!(!d.reasons.is_empty());
                }
            }
        }
    }
}
