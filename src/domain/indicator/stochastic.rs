//! Stochastic oscillator.
//!
//! %K = 100 × (close − lowest low over k bars) / (highest high − lowest low)
//! %D = SMA(d) of %K
//!
//! A window with zero range leaves %K undefined; that point and any %D
//! depending on it are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_stochastic(bars: &[Candle], k_period: usize, d_period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic { k_period, d_period };
    if k_period == 0 || d_period == 0 {
        return IndicatorSeries {
            indicator_type,
            values: Vec::new(),
        };
    }

    let k_values: Vec<Option<f64>> = (0..bars.len())
        .map(|i| {
            if i + 1 < k_period {
                return None;
            }
            let window = &bars[i + 1 - k_period..=i];
            let highest = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
            let lowest = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);
            let range = highest - lowest;
            if range <= 0.0 {
                None
            } else {
                Some(100.0 * (bars[i].close - lowest) / range)
            }
        })
        .collect();

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let d = if i + 1 >= d_period {
                k_values[i + 1 - d_period..=i]
                    .iter()
                    .copied()
                    .sum::<Option<f64>>()
                    .map(|sum| sum / d_period as f64)
            } else {
                None
            };
            match (k_values[i], d) {
                (Some(k), Some(d)) => IndicatorPoint {
                    time: bar.open_time,
                    valid: true,
                    value: IndicatorValue::Stochastic { k, d },
                },
                (k, _) => IndicatorPoint {
                    time: bar.open_time,
                    valid: false,
                    value: IndicatorValue::Stochastic {
                        k: k.unwrap_or(0.0),
                        d: 0.0,
                    },
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
