//! Technical indicator implementations.
//!
//! Every calculator returns an [`IndicatorSeries`] aligned 1:1 with its input
//! bars. Points inside the warm-up window, or whose value is undefined, carry
//! `valid == false`; strategies read them through the accessor methods, which
//! turn an invalid point into [`SigtraderError::InsufficientData`].

pub mod bollinger;
pub mod ema;
pub mod fibonacci;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;
pub mod volume;
pub mod vwap;

pub use bollinger::calculate_bollinger;
pub use ema::calculate_ema;
pub use fibonacci::{FibonacciLevels, fibonacci_levels};
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;
pub use stddev::calculate_stddev;
pub use stochastic::calculate_stochastic;
pub use volume::{calculate_volume_sma, volume_ratio};
pub use vwap::calculate_vwap;

use chrono::{DateTime, Utc};
use std::fmt;

use super::error::SigtraderError;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub time: DateTime<Utc>,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, Copy)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Stochastic {
        k: f64,
        d: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Stddev(usize),
    Vwap(usize),
    VolumeSma(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
}

impl IndicatorType {
    /// Number of bars needed before the first valid point.
    pub fn warmup_bars(&self) -> usize {
        match *self {
            IndicatorType::Sma(n)
            | IndicatorType::Ema(n)
            | IndicatorType::Stddev(n)
            | IndicatorType::Vwap(n)
            | IndicatorType::VolumeSma(n) => n,
            IndicatorType::Rsi(n) => n + 1,
            IndicatorType::Macd { slow, signal, .. } => slow + signal - 1,
            IndicatorType::Stochastic { k_period, d_period } => k_period + d_period - 1,
            IndicatorType::Bollinger { period, .. } => period,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Valid point at `index`, or `InsufficientData` when it is still warming up.
    pub fn point(&self, index: usize) -> Result<&IndicatorPoint, SigtraderError> {
        match self.values.get(index) {
            Some(p) if p.valid => Ok(p),
            _ => Err(SigtraderError::InsufficientData {
                what: self.indicator_type.to_string(),
                bars: (index + 1).min(self.values.len()),
                minimum: self.indicator_type.warmup_bars(),
            }),
        }
    }

    pub fn simple(&self, index: usize) -> Result<f64, SigtraderError> {
        match self.point(index)?.value {
            IndicatorValue::Simple(v) => Ok(v),
            other => Err(self.shape_error(other)),
        }
    }

    /// (line, signal, histogram)
    pub fn macd(&self, index: usize) -> Result<(f64, f64, f64), SigtraderError> {
        match self.point(index)?.value {
            IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } => Ok((line, signal, histogram)),
            other => Err(self.shape_error(other)),
        }
    }

    /// (%K, %D)
    pub fn stochastic(&self, index: usize) -> Result<(f64, f64), SigtraderError> {
        match self.point(index)?.value {
            IndicatorValue::Stochastic { k, d } => Ok((k, d)),
            other => Err(self.shape_error(other)),
        }
    }

    /// (upper, middle, lower)
    pub fn bollinger(&self, index: usize) -> Result<(f64, f64, f64), SigtraderError> {
        match self.point(index)?.value {
            IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            } => Ok((upper, middle, lower)),
            other => Err(self.shape_error(other)),
        }
    }

    fn shape_error(&self, value: IndicatorValue) -> SigtraderError {
        SigtraderError::data(format!(
            "{} produced unexpected value {:?}",
            self.indicator_type, value
        ))
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::Vwap(window) => write!(f, "VWAP({})", window),
            IndicatorType::VolumeSma(window) => write!(f, "VOLUME_SMA({})", window),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use testing::bars_from_closes;

    #[test]
    fn indicator_type_display_macd() {
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn indicator_type_display_bollinger() {
        let boll = IndicatorType::Bollinger {
            period: 20,
            stddev_mult_x100: 200,
        };
        assert_eq!(boll.to_string(), "BOLLINGER(20,2)");
    }

    #[test]
    fn warmup_bars_per_type() {
        assert_eq!(IndicatorType::Ema(200).warmup_bars(), 200);
        assert_eq!(IndicatorType::Rsi(14).warmup_bars(), 15);
        assert_eq!(
            IndicatorType::Macd {
                fast: 12,
                slow: 26,
                signal: 9
            }
            .warmup_bars(),
            34
        );
        assert_eq!(
            IndicatorType::Stochastic {
                k_period: 14,
                d_period: 3
            }
            .warmup_bars(),
            16
        );
    }

    #[test]
    fn invalid_point_is_insufficient_data() {
        let bars = bars_from_closes(&[1.0, 2.0, 3.0]);
        let series = calculate_ema(&bars, 3);
        let err = series.simple(1).unwrap_err();
        assert!(matches!(err, SigtraderError::InsufficientData { .. }));
        assert!(series.simple(2).is_ok());
    }

    #[test]
    fn out_of_range_index_is_insufficient_data() {
        let bars = bars_from_closes(&[1.0, 2.0, 3.0]);
        let series = calculate_ema(&bars, 2);
        assert!(series.simple(10).is_err());
    }

    #[test]
    fn wrong_shape_is_data_error() {
        let bars = bars_from_closes(&[1.0, 2.0, 3.0]);
        let series = calculate_ema(&bars, 2);
        let err = series.macd(2).unwrap_err();
        assert!(matches!(err, SigtraderError::Data { .. }));
    }
}
