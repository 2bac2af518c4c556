//! Volume average and the last-bar volume ratio.

use crate::domain::candle::Candle;
use crate::domain::indicator::sma::sma_values;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_volume_sma(bars: &[Candle], window: usize) -> IndicatorSeries {
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let values = sma_values(&volumes, window)
        .into_iter()
        .zip(bars)
        .map(|(v, bar)| IndicatorPoint {
            time: bar.open_time,
            valid: v.is_some(),
            value: IndicatorValue::Simple(v.unwrap_or(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::VolumeSma(window),
        values,
    }
}

/// Last bar's volume over the `window`-bar average volume.
///
/// A non-positive average yields a neutral ratio of 1.0; `None` while the
/// average is still warming up.
pub fn volume_ratio(bars: &[Candle], window: usize) -> Option<f64> {
    let last = bars.last()?;
    let series = calculate_volume_sma(bars, window);
    let avg = series.simple(bars.len() - 1).ok()?;
    if avg > 0.0 {
        Some(last.volume / avg)
    } else {
        Some(1.0)
    }
}
