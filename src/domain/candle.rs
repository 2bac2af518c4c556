//! OHLCV candle and validated candle series.

use chrono::{DateTime, Utc};
use std::ops::Deref;

use super::error::SigtraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Checks positive finite prices, non-negative volume and strictly
/// increasing timestamps.
pub fn validate_candles(candles: &[Candle]) -> Result<(), SigtraderError> {
    for (i, c) in candles.iter().enumerate() {
        let prices = [c.open, c.high, c.low, c.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(SigtraderError::data(format!(
                "non-positive price at bar {} ({})",
                i, c.open_time
            )));
        }
        if !c.volume.is_finite() || c.volume < 0.0 {
            return Err(SigtraderError::data(format!(
                "invalid volume at bar {} ({})",
                i, c.open_time
            )));
        }
        if i > 0 && c.open_time <= candles[i - 1].open_time {
            return Err(SigtraderError::data(format!(
                "timestamps not strictly increasing at bar {} ({})",
                i, c.open_time
            )));
        }
    }
    Ok(())
}

/// Time-ordered bars with strictly increasing timestamps and positive prices.
///
/// Built once per evaluation and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(candles: Vec<Candle>) -> Result<Self, SigtraderError> {
        validate_candles(&candles)?;
        Ok(Self { candles })
    }

    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn into_inner(self) -> Vec<Candle> {
        self.candles
    }
}

impl Deref for CandleSeries {
    type Target = [Candle];

    fn deref(&self) -> &[Candle] {
        &self.candles
    }
}
