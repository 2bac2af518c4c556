//! Stochastic reversal + Fibonacci retracement + trend alignment strategy.
//!
//! Two agreeing sub-signals are required, and the close must sit on the
//! matching side of the trend EMA (above for buys, below for sells).

use crate::domain::candle::Candle;
use crate::domain::config::IndicatorParams;
use crate::domain::error::SigtraderError;
use crate::domain::indicator::{
    FibonacciLevels, IndicatorSeries, calculate_ema, calculate_stochastic, fibonacci_levels,
};
use crate::domain::signal::{Action, SignalDecision, SignalTally};
use crate::domain::strategy::{Strategy, last_two, replay_with};

const REQUIRED_SUBSIGNALS: u32 = 2;

/// Relative distance from a retracement level that counts as a touch.
const FIB_PROXIMITY: f64 = 0.005;

pub struct StochasticFibTrend {
    params: IndicatorParams,
}

impl StochasticFibTrend {
    pub const NAME: &'static str = "stoch_fib_trend";

    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    fn stochastic(&self, candles: &[Candle]) -> IndicatorSeries {
        calculate_stochastic(candles, self.params.stoch_k, self.params.stoch_d)
    }

    fn reversal_at(
        &self,
        stoch: &IndicatorSeries,
        prev: usize,
        i: usize,
    ) -> Result<Action, SigtraderError> {
        Ok(stochastic_reversal(
            stoch.stochastic(prev)?,
            stoch.stochastic(i)?,
            self.params.stoch_oversold,
            self.params.stoch_overbought,
        ))
    }
}

/// %K inside the oversold zone and crossing up through %D is a buy; the
/// mirror image in the overbought zone is a sell.
pub(crate) fn stochastic_reversal(
    (prev_k, prev_d): (f64, f64),
    (k, d): (f64, f64),
    oversold: f64,
    overbought: f64,
) -> Action {
    if k < oversold && prev_k <= prev_d && k > d {
        Action::Buy
    } else if k > overbought && prev_k >= prev_d && k < d {
        Action::Sell
    } else {
        Action::None
    }
}

/// Near the 61.8% level is a buy; near the 38.2% level a sell.
pub(crate) fn retracement_touch(price: f64, levels: &FibonacciLevels) -> Action {
    if (price - levels.level_618).abs() / price < FIB_PROXIMITY {
        Action::Buy
    } else if (price - levels.level_382).abs() / price < FIB_PROXIMITY {
        Action::Sell
    } else {
        Action::None
    }
}

impl Strategy for StochasticFibTrend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn evaluate(&self, candles: &[Candle]) -> Result<SignalDecision, SigtraderError> {
        let p = &self.params;
        let (prev, last) = last_two(candles, self.name())?;
        let price = candles[last].close;

        let stoch = self.stochastic(candles);
        let reversal = self.reversal_at(&stoch, prev, last)?;
        let levels = fibonacci_levels(candles, p.fib_lookback)?;
        let trend = calculate_ema(candles, p.trend_period).simple(last)?;

        let mut tally = SignalTally::default();

        match reversal {
            Action::Buy => tally.buy("Stochastic oversold reversal"),
            Action::Sell => tally.sell("Stochastic overbought reversal"),
            Action::None => {}
        }

        match retracement_touch(price, &levels) {
            Action::Buy => tally.buy("Price near Fibonacci 61.8% retracement"),
            Action::Sell => tally.sell("Price near Fibonacci 38.2% retracement"),
            Action::None => {}
        }

        let above_trend = price > trend;
        let below_trend = price < trend;
        if above_trend && tally.has_sell() {
            tally.note("Trend filter: against bullish trend");
        } else if !above_trend && tally.has_buy() {
            tally.note("Trend filter: against bearish trend");
        }

        let buy_ok = tally.buys >= REQUIRED_SUBSIGNALS && above_trend;
        let sell_ok = tally.sells >= REQUIRED_SUBSIGNALS && below_trend;
        Ok(tally.decide(Self::NAME, buy_ok, sell_ok))
    }

    fn replay_signals(&self, candles: &[Candle]) -> Vec<Action> {
        replay_with(&self.stochastic(candles), |series, prev, i| {
            self.reversal_at(series, prev, i)
        })
    }
}
