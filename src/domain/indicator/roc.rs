//! ROC (Rate of Change) on closes and on volume.
//!
//! ROC(n)[i] = ((X[i] - X[i-n]) / X[i-n]) * 100
//! If X[i-n] == 0: ROC = 0
//! Warmup: first n candles invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 10;

pub fn calculate_roc(candles: &[Candle], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    rate_of_change(candles, &closes, period, IndicatorType::Roc(period))
}

pub fn calculate_volume_roc(candles: &[Candle], period: usize) -> IndicatorSeries {
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    rate_of_change(candles, &volumes, period, IndicatorType::VolumeRoc(period))
}

fn rate_of_change(
    candles: &[Candle],
    source: &[f64],
    period: usize,
    indicator_type: IndicatorType,
) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            if i < period {
                return IndicatorPoint::invalid(candle.timestamp, IndicatorValue::simple(0.0));
            }
            let prev = source[i - period];
            let roc = if prev == 0.0 {
                0.0
            } else {
                ((source[i] - prev) / prev) * 100.0
            };
            IndicatorPoint::valid(candle.timestamp, IndicatorValue::simple(roc))
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
