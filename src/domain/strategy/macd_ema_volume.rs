//! MACD + EMA cross + volume strategy.

use crate::domain::candle::Candle;
use crate::domain::config::{IndicatorParams, SignalFilters};
use crate::domain::error::SigtraderError;
use crate::domain::indicator::{IndicatorSeries, calculate_ema, calculate_macd, volume_ratio};
use crate::domain::signal::{Action, SignalDecision, SignalTally};
use crate::domain::strategy::{Strategy, last_two, replay_with};

/// Sub-signals needed before volume is even considered.
const REQUIRED_SUBSIGNALS: u32 = 2;

pub struct MacdEmaVolume {
    params: IndicatorParams,
    filters: SignalFilters,
}

impl MacdEmaVolume {
    pub const NAME: &'static str = "macd_ema_vol";

    pub fn new(params: IndicatorParams, filters: SignalFilters) -> Self {
        Self { params, filters }
    }

    fn macd(&self, candles: &[Candle]) -> IndicatorSeries {
        let p = &self.params;
        calculate_macd(candles, p.macd_fast, p.macd_slow, p.macd_signal)
    }
}

/// Histogram sign flip between two bars.
fn histogram_flip(macd: &IndicatorSeries, prev: usize, i: usize) -> Result<Action, SigtraderError> {
    let (_, _, before) = macd.macd(prev)?;
    let (_, _, now) = macd.macd(i)?;
    Ok(if now > 0.0 && before <= 0.0 {
        Action::Buy
    } else if now < 0.0 && before >= 0.0 {
        Action::Sell
    } else {
        Action::None
    })
}

impl Strategy for MacdEmaVolume {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn evaluate(&self, candles: &[Candle]) -> Result<SignalDecision, SigtraderError> {
        let p = &self.params;
        let (prev, last) = last_two(candles, self.name())?;

        let macd = self.macd(candles);
        let fast = calculate_ema(candles, p.ema_short);
        let slow = calculate_ema(candles, p.ema_long);

        let flip = histogram_flip(&macd, prev, last)?;
        let (line, signal, _) = macd.macd(last)?;
        let (fast_now, fast_prev) = (fast.simple(last)?, fast.simple(prev)?);
        let (slow_now, slow_prev) = (slow.simple(last)?, slow.simple(prev)?);
        let volume = volume_ratio(candles, p.volume_window).ok_or_else(|| {
            SigtraderError::InsufficientData {
                what: format!("VOLUME_SMA({})", p.volume_window),
                bars: candles.len(),
                minimum: p.volume_window,
            }
        })?;

        let mut tally = SignalTally::default();

        match flip {
            Action::Buy if line > signal => tally.buy("MACD bullish crossover"),
            Action::Sell if line < signal => tally.sell("MACD bearish crossover"),
            _ => {}
        }

        if fast_now > slow_now && fast_prev <= slow_prev {
            tally.buy(format!("EMA{} crossed above EMA{}", p.ema_short, p.ema_long));
        } else if fast_now < slow_now && fast_prev >= slow_prev {
            tally.sell(format!("EMA{} crossed below EMA{}", p.ema_short, p.ema_long));
        }

        let volume_ok = volume >= self.filters.volume_threshold;
        if volume_ok {
            if tally.has_buy() || tally.has_sell() {
                tally.note(format!("Volume confirmed: {:.2}x", volume));
            }
        } else {
            tally.note(format!("Insufficient volume: {:.2}x", volume));
        }

        let buy_ok = tally.buys >= REQUIRED_SUBSIGNALS && volume_ok;
        let sell_ok = tally.sells >= REQUIRED_SUBSIGNALS && volume_ok;
        Ok(tally.decide(Self::NAME, buy_ok, sell_ok))
    }

    fn replay_signals(&self, candles: &[Candle]) -> Vec<Action> {
        replay_with(&self.macd(candles), histogram_flip)
    }
}
