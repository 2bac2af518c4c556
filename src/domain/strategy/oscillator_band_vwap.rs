//! Oscillator + Bollinger band + VWAP strategy.
//!
//! Sub-signals: RSI crossing up through the oversold level (buy) or down
//! through the overbought level (sell); close within 1% of the lower/upper
//! band; close crossing the rolling VWAP between the last two bars.
//! A decision needs `min_signal_strength` agreeing sub-signals, the close on
//! the right side of the long trend EMA, and volume at or above the threshold.

use crate::domain::candle::Candle;
use crate::domain::config::{IndicatorParams, SignalFilters};
use crate::domain::error::SigtraderError;
use crate::domain::indicator::{
    IndicatorSeries, calculate_bollinger, calculate_ema, calculate_rsi, calculate_vwap,
    volume_ratio,
};
use crate::domain::signal::{Action, SignalDecision, SignalTally};
use crate::domain::strategy::{Strategy, crossed_down, crossed_up, last_two, replay_with};

/// Close within this fraction of a band counts as touching it.
const BAND_PROXIMITY: f64 = 0.01;

pub struct OscillatorBandVwap {
    params: IndicatorParams,
    filters: SignalFilters,
}

impl OscillatorBandVwap {
    pub const NAME: &'static str = "rsi_bb_vwap";

    pub fn new(params: IndicatorParams, filters: SignalFilters) -> Self {
        Self { params, filters }
    }

    fn rsi_signal(
        &self,
        rsi: &IndicatorSeries,
        prev: usize,
        last: usize,
    ) -> Result<Action, SigtraderError> {
        let (before, now) = (rsi.simple(prev)?, rsi.simple(last)?);
        Ok(if crossed_up(before, now, self.params.rsi_oversold) {
            Action::Buy
        } else if crossed_down(before, now, self.params.rsi_overbought) {
            Action::Sell
        } else {
            Action::None
        })
    }
}

impl Strategy for OscillatorBandVwap {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn evaluate(&self, candles: &[Candle]) -> Result<SignalDecision, SigtraderError> {
        let p = &self.params;
        let (prev, last) = last_two(candles, self.name())?;
        let price = candles[last].close;

        let rsi = calculate_rsi(candles, p.rsi_period);
        let bands = calculate_bollinger(candles, p.bb_period, p.bb_std);
        let vwap = calculate_vwap(candles, p.vwap_window);
        let trend = calculate_ema(candles, p.ema_long);

        let rsi_action = self.rsi_signal(&rsi, prev, last)?;
        let (upper, _, lower) = bands.bollinger(last)?;
        let (vwap_now, vwap_prev) = (vwap.simple(last)?, vwap.simple(prev)?);
        let trend_now = trend.simple(last)?;
        let volume = volume_ratio(candles, p.volume_window).ok_or_else(|| {
            SigtraderError::InsufficientData {
                what: format!("VOLUME_SMA({})", p.volume_window),
                bars: candles.len(),
                minimum: p.volume_window,
            }
        })?;

        let mut tally = SignalTally::default();

        match rsi_action {
            Action::Buy => tally.buy(format!("RSI crossed up through {}", p.rsi_oversold)),
            Action::Sell => tally.sell(format!("RSI crossed down through {}", p.rsi_overbought)),
            Action::None => {}
        }

        if price <= lower * (1.0 + BAND_PROXIMITY) {
            tally.buy("Price near lower Bollinger band");
        } else if price >= upper * (1.0 - BAND_PROXIMITY) {
            tally.sell("Price near upper Bollinger band");
        }

        let prev_close = candles[prev].close;
        if price > vwap_now && prev_close <= vwap_prev {
            tally.buy("Price crossed above VWAP");
        } else if price < vwap_now && prev_close >= vwap_prev {
            tally.sell("Price crossed below VWAP");
        }

        let trend_bullish = price > trend_now;
        if !trend_bullish && tally.has_buy() {
            tally.note("Trend filter: bearish trend");
        } else if trend_bullish && tally.has_sell() {
            tally.note("Trend filter: bullish trend");
        }

        let volume_ok = volume >= self.filters.volume_threshold;
        if !volume_ok {
            tally.note(format!("Low volume: {:.2}", volume));
        }

        let min = self.filters.min_signal_strength;
        let buy_ok = tally.buys >= min && trend_bullish && volume_ok;
        let sell_ok = tally.sells >= min && !trend_bullish && volume_ok;
        Ok(tally.decide(Self::NAME, buy_ok, sell_ok))
    }

    fn replay_signals(&self, candles: &[Candle]) -> Vec<Action> {
        let rsi = calculate_rsi(candles, self.params.rsi_period);
        replay_with(&rsi, |series, prev, i| self.rsi_signal(series, prev, i))
    }
}
