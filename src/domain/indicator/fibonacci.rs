//! Fibonacci retracement levels from the rolling high/low.

use crate::domain::candle::Candle;
use crate::domain::error::SigtraderError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FibonacciLevels {
    pub high: f64,
    pub level_236: f64,
    pub level_382: f64,
    pub level_500: f64,
    pub level_618: f64,
    pub low: f64,
}

/// Levels over the last `lookback` bars: `high − ratio·(high − low)`.
pub fn fibonacci_levels(bars: &[Candle], lookback: usize) -> Result<FibonacciLevels, SigtraderError> {
    if lookback == 0 || bars.len() < lookback {
        return Err(SigtraderError::InsufficientData {
            what: format!("FIBONACCI({})", lookback),
            bars: bars.len(),
            minimum: lookback.max(1),
        });
    }

    let window = &bars[bars.len() - lookback..];
    let high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let diff = high - low;

    Ok(FibonacciLevels {
        high,
        level_236: high - 0.236 * diff,
        level_382: high - 0.382 * diff,
        level_500: high - 0.5 * diff,
        level_618: high - 0.618 * diff,
        low,
    })
}
