//! Rolling volume-weighted average price.
//!
//! VWAP(w)[i] = Σ typical·volume / Σ volume over the last w bars.
//! Windows with no traded volume are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_vwap(bars: &[Candle], window: usize) -> IndicatorSeries {
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let vwap = if window > 0 && i + 1 >= window {
                let slice = &bars[i + 1 - window..=i];
                let volume: f64 = slice.iter().map(|b| b.volume).sum();
                let weighted: f64 = slice.iter().map(|b| b.typical_price() * b.volume).sum();
                (volume > 0.0).then(|| weighted / volume)
            } else {
                None
            };
            IndicatorPoint {
                time: bar.open_time,
                valid: vwap.is_some(),
                value: IndicatorValue::Simple(vwap.unwrap_or(0.0)),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Vwap(window),
        values,
    }
}
