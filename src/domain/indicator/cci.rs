//! CCI (Commodity Channel Index).
//!
//! CCI = (TP - SMA(TP, n)) / (0.015 * MAD), where MAD is the mean absolute
//! deviation of TP around its SMA over the same n candles. Undefined when MAD
//! is zero.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 14;
pub const LAMBERT_CONSTANT: f64 = 0.015;

pub fn calculate_cci(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 {
        return IndicatorSeries::empty(IndicatorType::Cci(period));
    }

    let typical: Vec<f64> = candles.iter().map(|c| c.typical_price()).collect();
    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            if i + 1 < period {
                return IndicatorPoint::invalid(candle.timestamp, IndicatorValue::simple(0.0));
            }
            let window = &typical[i + 1 - period..=i];
            let mean = window.iter().sum::<f64>() / period as f64;
            let mad = window.iter().map(|tp| (tp - mean).abs()).sum::<f64>() / period as f64;
            if mad == 0.0 {
                return IndicatorPoint::invalid(candle.timestamp, IndicatorValue::simple(0.0));
            }
            let cci = (typical[i] - mean) / (LAMBERT_CONSTANT * mad);
            IndicatorPoint::valid(candle.timestamp, IndicatorValue::simple(cci))
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Cci(period),
        values,
    }
}
