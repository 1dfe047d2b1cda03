//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) candles are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::smoothing;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_ema(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 || candles.is_empty() {
        return IndicatorSeries::empty(IndicatorType::Ema(period));
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let values = candles
        .iter()
        .zip(smoothing::ema(&closes, period))
        .map(|(candle, ema)| match ema {
            Some(v) => IndicatorPoint::valid(candle.timestamp, IndicatorValue::simple(v)),
            None => IndicatorPoint::invalid(candle.timestamp, IndicatorValue::simple(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}
